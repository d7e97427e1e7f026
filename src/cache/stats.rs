//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, fetches and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from a fresh cached item
    pub hits: u64,
    /// Lookups that had to go to the fetch strategy
    pub misses: u64,
    /// Successful fetches
    pub fetches: u64,
    /// Items removed to make space
    pub evictions: u64,
    /// Items removed for any other reason (remove, flush, expiry sweep)
    pub removals: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Current summed size of all entries
    pub current_size: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_fetch(&mut self) {
        self.fetches += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_removal(&mut self) {
        self.removals += 1;
    }
}
