//! Filters that separate likely squats from noise.
//!
//! Filters run in a fixed order, each one annotating the match it receives
//! and either passing it on or dropping it:
//! 1. Ownership: same-owner packages are not squats
//! 2. Similarity: the description must look like the target's
//! 3. Allow-list: known benign publishers are dropped last, overriding all else

pub mod allowlist;
pub mod ownership;
pub mod similarity;

pub use allowlist::{AllowList, AllowListFilter, Signature};
pub use ownership::OwnershipFilter;
pub use similarity::SimilarityFilter;

use crate::types::CandidateMatch;
use tracing::debug;

/// A single stage of the filter chain.
pub trait MatchFilter {
    fn name(&self) -> &'static str;

    /// Annotate `m` and return it if it should continue down the chain.
    fn apply(&self, m: CandidateMatch) -> Option<CandidateMatch>;
}

/// Ordered chain of filters.
pub struct FilterChain {
    filters: Vec<Box<dyn MatchFilter>>,
}

impl FilterChain {
    /// The standard ownership, similarity, allow-list chain.
    pub fn standard(similarity: SimilarityFilter, allowlist: AllowListFilter) -> Self {
        Self {
            filters: vec![
                Box::new(OwnershipFilter),
                Box::new(similarity),
                Box::new(allowlist),
            ],
        }
    }

    pub fn empty() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Append a filter to the end of the chain.
    pub fn then<F: MatchFilter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Run every match through the chain, keeping the survivors in order.
    pub fn run(&self, matches: Vec<CandidateMatch>) -> Vec<CandidateMatch> {
        let mut current = matches;
        for filter in &self.filters {
            let before = current.len();
            current = current.into_iter().filter_map(|m| filter.apply(m)).collect();
            debug!(
                "Filter {}: {} -> {} matches",
                filter.name(),
                before,
                current.len()
            );
        }
        current
    }
}
