//! Fetch Strategy Module
//!
//! The pluggable half of a cache: how values are produced on a miss and how
//! big they are.
//!
//! # Strategies
//! - [`ActionFetch`]: one value per key through an injected function
//! - [`BulkFetch`]: the whole key space reloaded at once, including the
//!   preloaded specialisation that serves a fixed map

mod action;
mod bulk;

pub use action::{ActionCache, ActionFetch};
pub use bulk::{BulkFetch, BulkFetchCache, PreloadedCache};

use crate::cache::WriteScope;
use crate::error::Result;

// == Size Estimator ==
/// Converts a value into the abstract units counted against `max_capacity`.
pub trait SizeEstimator<V> {
    fn estimate_size(&self, value: &V) -> u32;
}

// == Fetch Strategy ==
/// Produces values for keys the cache does not hold.
///
/// `fetch` runs while the cache's write lock is held; `scope` gives access to
/// the cache contents under that same lock. `None` is a null value, handled
/// by the cache's null value policy.
pub trait FetchStrategy<K, V>: SizeEstimator<V> + Send + Sync {
    fn fetch(&self, key: &K, scope: &mut WriteScope<'_, K, V>) -> Result<Option<V>>;

    /// Whether single keys may be removed from a cache using this strategy.
    fn supports_remove(&self) -> bool {
        true
    }
}
