//! Single-key fetch strategy.

use std::fmt::Debug;
use std::hash::Hash;

use crate::cache::{CacheEngine, WriteScope};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::fetch::{FetchStrategy, SizeEstimator};

type FetchFn<K, V> = Box<dyn Fn(&K) -> Result<Option<V>> + Send + Sync>;
type SizeFn<V> = Box<dyn Fn(&V) -> u32 + Send + Sync>;

// == Action Fetch ==
/// Fetches one value per key through an injected function.
///
/// Without a size estimator every value has size 0, so capacity never limits
/// the cache.
pub struct ActionFetch<K, V> {
    fetch: FetchFn<K, V>,
    size: Option<SizeFn<V>>,
}

impl<K, V> ActionFetch<K, V> {
    /// Wraps an infallible fetch function.
    pub fn new<F>(fetch: F) -> Self
    where
        F: Fn(&K) -> Option<V> + Send + Sync + 'static,
    {
        Self::fallible(move |key| Ok(fetch(key)))
    }

    /// Wraps a fetch function that can fail; its errors reach the caller of `get`.
    pub fn fallible<F>(fetch: F) -> Self
    where
        F: Fn(&K) -> Result<Option<V>> + Send + Sync + 'static,
    {
        Self {
            fetch: Box::new(fetch),
            size: None,
        }
    }

    pub fn with_size_estimator<F>(mut self, size: F) -> Self
    where
        F: Fn(&V) -> u32 + Send + Sync + 'static,
    {
        self.size = Some(Box::new(size));
        self
    }
}

impl<K, V> SizeEstimator<V> for ActionFetch<K, V> {
    fn estimate_size(&self, value: &V) -> u32 {
        self.size.as_ref().map_or(0, |size| size(value))
    }
}

impl<K, V> FetchStrategy<K, V> for ActionFetch<K, V> {
    fn fetch(&self, key: &K, _scope: &mut WriteScope<'_, K, V>) -> Result<Option<V>> {
        (self.fetch)(key)
    }
}

/// A cache that fetches values one key at a time.
pub type ActionCache<K, V> = CacheEngine<K, V, ActionFetch<K, V>>;

impl<K, V> CacheEngine<K, V, ActionFetch<K, V>>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    // == Constructor ==
    /// Creates a cache whose items all have size 0.
    ///
    /// # Arguments
    /// * `config` - Cache configuration
    /// * `fetch` - Produces the value for a key, `None` for a null
    pub fn new<F>(config: CacheConfig, fetch: F) -> Result<Self>
    where
        F: Fn(&K) -> Option<V> + Send + Sync + 'static,
    {
        Self::with_strategy(config, ActionFetch::new(fetch))
    }

    /// Creates a cache that sizes each value with `size`.
    pub fn with_size_estimator<F, G>(config: CacheConfig, fetch: F, size: G) -> Result<Self>
    where
        F: Fn(&K) -> Option<V> + Send + Sync + 'static,
        G: Fn(&V) -> u32 + Send + Sync + 'static,
    {
        Self::with_strategy(config, ActionFetch::new(fetch).with_size_estimator(size))
    }
}
