//! Convenience helpers layered over any [`Cache`].

use crate::api::Cache;
use crate::error::Result;

// == Cache Extensions ==
pub trait CacheExt<K, V>: Cache<K, V> {
    /// Index-style store: loads a single pair as a bulk load.
    fn set(&self, key: K, value: V) -> Result<()> {
        self.bulk_load(std::iter::once((key, value)))
    }

    /// Snapshot of every cached non-null value, in no particular order.
    fn cached_values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.get_cached_items()
            .values()
            .filter_map(|item| item.value().cloned())
            .collect()
    }
}

impl<K, V, C> CacheExt<K, V> for C where C: Cache<K, V> + ?Sized {}
