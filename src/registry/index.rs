//! Immutable per-run indices over the registry query results.

use crate::types::{PackageRecord, PopularityTarget, RecentCandidate};
use std::collections::HashMap;
use tracing::{debug, warn};

/// The protection targets, ordered by rank.
#[derive(Debug, Clone, Default)]
pub struct PopularityIndex {
    targets: Vec<PopularityTarget>,
    by_name: HashMap<String, usize>,
}

impl PopularityIndex {
    /// Build the index from records already sorted by descending popularity.
    ///
    /// Duplicate names keep their first (most popular) occurrence and ranks
    /// stay dense. At most `limit` targets are kept.
    pub fn build(records: Vec<PackageRecord>, limit: usize) -> Self {
        let mut targets = Vec::with_capacity(records.len().min(limit));
        let mut by_name = HashMap::new();

        for record in records {
            if targets.len() == limit {
                break;
            }
            if by_name.contains_key(&record.name) {
                debug!("Duplicate popular package {}, keeping higher rank", record.name);
                continue;
            }
            by_name.insert(record.name.clone(), targets.len());
            targets.push(PopularityTarget {
                rank: targets.len() + 1,
                record,
            });
        }

        if targets.len() < limit {
            warn!(
                "Popularity source returned {} packages, fewer than the requested {}",
                targets.len(),
                limit
            );
        }

        Self { targets, by_name }
    }

    pub fn get(&self, name: &str) -> Option<&PopularityTarget> {
        self.by_name.get(name).map(|&i| &self.targets[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PopularityTarget> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Packages published or updated inside the trailing window, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct RecentIndex {
    candidates: HashMap<String, RecentCandidate>,
}

impl RecentIndex {
    /// Build the index, dropping anything that is itself a protection target.
    pub fn build(records: Vec<PackageRecord>, popular: &PopularityIndex) -> Self {
        let mut candidates = HashMap::with_capacity(records.len());
        let mut skipped = 0usize;

        for record in records {
            if popular.contains(&record.name) {
                skipped += 1;
                continue;
            }
            candidates
                .entry(record.name.clone())
                .or_insert(RecentCandidate { record });
        }

        debug!(
            "Recent index holds {} packages ({} popular packages excluded)",
            candidates.len(),
            skipped
        );

        Self { candidates }
    }

    pub fn get(&self, name: &str) -> Option<&RecentCandidate> {
        self.candidates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.candidates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
