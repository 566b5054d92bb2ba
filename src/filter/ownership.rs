//! Drops matches where the candidate and target share an owner.
//!
//! crates.io has no namespaces, so owner identity stands in for one: a
//! maintainer publishing `foo-derive` next to `foo` is not squatting.

use crate::filter::MatchFilter;
use crate::types::CandidateMatch;
use tracing::debug;

/// True if the candidate and target have at least one owner in common.
pub fn owners_overlap(m: &CandidateMatch) -> bool {
    m.target.record.shares_owner_with(&m.candidate)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipFilter;

impl MatchFilter for OwnershipFilter {
    fn name(&self) -> &'static str {
        "ownership"
    }

    fn apply(&self, mut m: CandidateMatch) -> Option<CandidateMatch> {
        m.owner_overlap = owners_overlap(&m);
        if m.owner_overlap {
            debug!(
                "Filter: {} shares an owner with {}",
                m.candidate_name(),
                m.target_name()
            );
            return None;
        }
        Some(m)
    }
}
