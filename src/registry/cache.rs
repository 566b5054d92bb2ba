//! In-memory caching layer for owner lookups.

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cache entry with TTL.
#[derive(Debug, Clone)]
struct CacheEntry {
    owners: BTreeSet<String>,
    expires_at: Instant,
}

/// Thread-safe cache of crate owners, keyed by crate name.
#[derive(Debug, Clone)]
pub struct OwnerCache {
    cache: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl OwnerCache {
    /// Create a new cache with the given TTL in seconds.
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Get cached owners if present and not expired.
    pub fn get(&self, crate_name: &str) -> Option<BTreeSet<String>> {
        let entry = self.cache.get(crate_name)?;
        if Instant::now() < entry.expires_at {
            return Some(entry.owners.clone());
        }
        // Entry expired, remove it
        drop(entry);
        self.cache.remove(crate_name);
        None
    }

    pub fn set(&self, crate_name: &str, owners: BTreeSet<String>) {
        let entry = CacheEntry {
            owners,
            expires_at: Instant::now() + self.ttl,
        };
        self.cache.insert(crate_name.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_set_get() {
        let cache = OwnerCache::new(60);
        cache.set("serde", ["dtolnay".to_string()].into_iter().collect());

        let owners = cache.get("serde").expect("cached");
        assert!(owners.contains("dtolnay"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_miss() {
        let cache = OwnerCache::new(60);
        assert!(cache.get("nonexistent").is_none());
    }

    #[test]
    fn test_cache_expiry() {
        let cache = OwnerCache::new(0);
        cache.set("serde", BTreeSet::new());
        assert!(cache.get("serde").is_none());
        assert!(cache.is_empty());
    }
}
