//! Cross-references generated variants against recently published packages.

use crate::generate::{BitFlipGenerator, TransformGenerator};
use crate::registry::{PopularityIndex, RecentIndex};
use crate::types::{CandidateMatch, GeneratedVariant, PopularityTarget};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Looks up variants of each protection target in the recent index.
pub struct CandidateMatcher<'a> {
    recent: &'a RecentIndex,
    transforms: TransformGenerator,
    bitflips: Option<BitFlipGenerator>,
}

impl<'a> CandidateMatcher<'a> {
    pub fn new(recent: &'a RecentIndex, transforms: TransformGenerator) -> Self {
        Self {
            recent,
            transforms,
            bitflips: Some(BitFlipGenerator::new()),
        }
    }

    /// Turn bit-flip variants on or off.
    pub fn with_bitflips(mut self, enabled: bool) -> Self {
        self.bitflips = enabled.then(BitFlipGenerator::new);
        self
    }

    /// Every match for every target, in rank order.
    pub fn match_all(&self, popular: &PopularityIndex) -> Vec<CandidateMatch> {
        if self.recent.is_empty() {
            debug!("Recent index is empty, nothing to match");
            return Vec::new();
        }

        let matches: Vec<CandidateMatch> = popular
            .iter()
            .flat_map(|target| self.match_target(target))
            .collect();

        debug!(
            "Matched {} variants across {} targets",
            matches.len(),
            popular.len()
        );
        matches
    }

    /// All matches for a single target.
    pub fn match_target(&self, target: &PopularityTarget) -> Vec<CandidateMatch> {
        let transforms = self.transforms.variants(target.name());
        let bitflips = self
            .bitflips
            .map(|g| g.variants(target.name()))
            .unwrap_or_default();

        // a name reachable by a transform and a bit flip keeps the transform tag
        let mut seen = HashSet::new();
        transforms
            .chain(bitflips)
            .filter(|variant| seen.insert(variant.name.clone()))
            .filter_map(|variant| self.lookup(target, variant))
            .collect()
    }

    fn lookup(
        &self,
        target: &PopularityTarget,
        variant: GeneratedVariant,
    ) -> Option<CandidateMatch> {
        let candidate = self.recent.get(&variant.name)?;
        if candidate.name() == target.name() {
            return None;
        }

        trace!(
            "Variant {} of {} ({}) exists in registry",
            variant.name,
            target.name(),
            variant.rule
        );
        Some(CandidateMatch::new(
            target.clone(),
            candidate.record.clone(),
            variant.rule,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PackageRecord, RuleKind};

    fn popular(names: &[&str]) -> PopularityIndex {
        PopularityIndex::build(
            names
                .iter()
                .map(|n| PackageRecord::new(n, ["A"], "HTTP library"))
                .collect(),
            names.len(),
        )
    }

    fn recent(names: &[&str], popular: &PopularityIndex) -> RecentIndex {
        RecentIndex::build(
            names
                .iter()
                .map(|n| PackageRecord::new(n, ["B"], "HTTP client library"))
                .collect(),
            popular,
        )
    }

    #[test]
    fn test_empty_recent_index_yields_nothing() {
        let popular = popular(&["requests", "serde"]);
        let recent = RecentIndex::default();
        let matcher = CandidateMatcher::new(&recent, TransformGenerator::new());
        assert!(matcher.match_all(&popular).is_empty());
    }

    #[test]
    fn test_matches_only_registry_names() {
        let popular = popular(&["requests"]);
        let recent = recent(&["requessts", "totally-unrelated"], &popular);
        let matcher = CandidateMatcher::new(&recent, TransformGenerator::new());

        let matches = matcher.match_all(&popular);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].candidate_name(), "requessts");
        assert_eq!(matches[0].target_name(), "requests");
        assert_eq!(matches[0].rule, RuleKind::Duplication);
        assert!(!matches[0].owner_overlap);
        assert!(matches[0].similarity.is_none());
        for m in &matches {
            assert!(recent.contains(m.candidate_name()));
        }
    }

    #[test]
    fn test_target_keeps_every_match() {
        let popular = popular(&["serde"]);
        let recent = recent(&["serd", "sedre", "serde-rs", "se2de"], &popular);
        let matcher = CandidateMatcher::new(&recent, TransformGenerator::new());

        let mut names: Vec<String> = matcher
            .match_all(&popular)
            .into_iter()
            .map(|m| m.candidate.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["se2de", "sedre", "serd", "serde-rs"]);
    }

    #[test]
    fn test_bitflip_matches_are_tagged() {
        let popular = popular(&["serde"]);
        // only reachable through a bit flip
        let recent = recent(&["se2de"], &popular);

        let matcher = CandidateMatcher::new(&recent, TransformGenerator::new());
        let matches = matcher.match_all(&popular);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].is_bit_flip);
        assert_eq!(matches[0].rule, RuleKind::BitFlip);

        let matcher =
            CandidateMatcher::new(&recent, TransformGenerator::new()).with_bitflips(false);
        assert!(matcher.match_all(&popular).is_empty());
    }

    #[test]
    fn test_one_match_per_name() {
        // `sdrde` is both a keyboard typo and a bit flip of `serde`
        let popular = popular(&["serde"]);
        let recent = recent(&["sdrde"], &popular);
        let matcher = CandidateMatcher::new(&recent, TransformGenerator::new());

        let matches = matcher.match_all(&popular);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule, RuleKind::KeyboardTypo);
        assert!(!matches[0].is_bit_flip);
    }

    #[test]
    fn test_popular_names_never_candidates() {
        // `serde` and `serdes` are both popular; neither may squat the other
        let popular = popular(&["serde", "serdes"]);
        let recent = recent(&["serde", "serdes"], &popular);
        let matcher = CandidateMatcher::new(&recent, TransformGenerator::new());
        assert!(matcher.match_all(&popular).is_empty());
    }
}
