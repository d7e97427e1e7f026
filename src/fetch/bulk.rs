//! Bulk fetch strategy.
//!
//! The whole key space is reloaded in one operation: on a miss the cache is
//! flushed and repopulated from the bulk source, then the requested key is
//! looked up in the freshly loaded map. Once loaded, the cache itself is the
//! only holder of the values. Per-key removal is refused and every value has
//! size 0.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::cache::{CacheEngine, NullValuePolicy, WriteScope};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::fetch::{FetchStrategy, SizeEstimator};

type BulkFn<K, V> = Box<dyn Fn() -> Result<HashMap<K, V>> + Send + Sync>;

// == Bulk Fetch ==
pub struct BulkFetch<K, V> {
    source: BulkFn<K, V>,
    fetch_once_only: bool,
    fetch_count: AtomicU64,
}

impl<K, V> BulkFetch<K, V> {
    /// Wraps a bulk source.
    ///
    /// # Arguments
    /// * `source` - Produces the complete key space
    /// * `fetch_once_only` - Reload only on the first miss instead of every miss
    pub fn new<F>(source: F, fetch_once_only: bool) -> Self
    where
        F: Fn() -> Result<HashMap<K, V>> + Send + Sync + 'static,
    {
        Self {
            source: Box::new(source),
            fetch_once_only,
            fetch_count: AtomicU64::new(0),
        }
    }

    /// A source that serves a fixed map, loaded once.
    pub fn preloaded(entries: HashMap<K, V>) -> Self
    where
        K: Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        Self::new(move || Ok(entries.clone()), true)
    }

    /// Number of bulk reloads performed so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    pub fn fetch_once_only(&self) -> bool {
        self.fetch_once_only
    }
}

impl<K, V> BulkFetch<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    // == Reload ==
    /// Replaces the cache contents with a fresh copy of the bulk source.
    ///
    /// Returns the loaded value for `requested`, if given and present.
    fn reload(&self, scope: &mut WriteScope<'_, K, V>, requested: Option<&K>) -> Result<Option<V>> {
        let entries = (self.source)()?;
        let value = requested.and_then(|key| entries.get(key).cloned());
        let count = entries.len();

        scope.flush();
        scope.bulk_load(entries)?;

        let reloads = self.fetch_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(count, reloads, "bulk source reloaded");
        Ok(value)
    }

    fn missing(key: &K, scope: &WriteScope<'_, K, V>) -> Result<Option<V>> {
        match scope.config().null_value_policy {
            NullValuePolicy::Throw => Err(CacheError::KeyNotFound(format!(
                "{:?} is not present in the bulk source",
                key
            ))),
            _ => Ok(None),
        }
    }
}

impl<K, V> SizeEstimator<V> for BulkFetch<K, V> {
    fn estimate_size(&self, _value: &V) -> u32 {
        0
    }
}

impl<K, V> FetchStrategy<K, V> for BulkFetch<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    fn fetch(&self, key: &K, scope: &mut WriteScope<'_, K, V>) -> Result<Option<V>> {
        if !self.fetch_once_only || self.fetch_count() == 0 {
            return match self.reload(scope, Some(key))? {
                Some(value) => Ok(Some(value)),
                None => Self::missing(key, scope),
            };
        }

        // Already loaded: a stale entry still carries the loaded value
        match scope.cached_item(key) {
            Some(item) => Ok(item.value().cloned()),
            None => Self::missing(key, scope),
        }
    }

    fn supports_remove(&self) -> bool {
        false
    }
}

/// A cache refreshed as a unit from a bulk source.
pub type BulkFetchCache<K, V> = CacheEngine<K, V, BulkFetch<K, V>>;

/// A bulk fetch cache over a fixed map: loaded on first use, served until
/// [`force_refresh`](CacheEngine::force_refresh).
pub type PreloadedCache<K, V> = BulkFetchCache<K, V>;

impl<K, V> CacheEngine<K, V, BulkFetch<K, V>>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    // == Constructor ==
    /// Creates a cache backed by `source`.
    pub fn new<F>(config: CacheConfig, source: F, fetch_once_only: bool) -> Result<Self>
    where
        F: Fn() -> Result<HashMap<K, V>> + Send + Sync + 'static,
    {
        Self::with_strategy(config, BulkFetch::new(source, fetch_once_only))
    }

    /// Creates a cache serving `entries`, with no expiration.
    pub fn preloaded(entries: HashMap<K, V>) -> Result<Self>
    where
        K: 'static,
        V: 'static,
    {
        Self::with_strategy(CacheConfig::default(), BulkFetch::preloaded(entries))
    }

    // == Force Refresh ==
    /// Reloads the bulk source now, regardless of `fetch_once_only`.
    pub fn force_refresh(&self) -> Result<()> {
        self.with_write_scope(|scope, strategy| strategy.reload(scope, None).map(|_| ()))
    }

    /// Number of bulk reloads performed so far.
    pub fn fetch_count(&self) -> u64 {
        self.strategy().fetch_count()
    }
}
