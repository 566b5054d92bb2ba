//! Keeps matches whose description resembles the target's.
//!
//! A name collision with an unrelated description is usually an honest
//! coincidence; a copied or near-copied description is the tell of
//! impersonation.

use crate::filter::MatchFilter;
use crate::similarity::{AcceptancePolicy, SimilarityStrategy};
use crate::types::CandidateMatch;
use tracing::debug;

pub struct SimilarityFilter {
    strategy: SimilarityStrategy,
    policy: AcceptancePolicy,
}

impl SimilarityFilter {
    pub fn new(strategy: SimilarityStrategy, policy: AcceptancePolicy) -> Self {
        Self { strategy, policy }
    }
}

impl MatchFilter for SimilarityFilter {
    fn name(&self) -> &'static str {
        "similarity"
    }

    fn apply(&self, mut m: CandidateMatch) -> Option<CandidateMatch> {
        let score = self.strategy.score(&m.target.record, &m.candidate);
        m.similarity = Some(score);

        if !self.policy.accepts(&score) {
            debug!(
                "Filter: {} description unlike {} ({:?})",
                m.candidate_name(),
                m.target_name(),
                score
            );
            return None;
        }
        Some(m)
    }
}
