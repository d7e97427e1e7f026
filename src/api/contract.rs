//! Cache Contract
//!
//! The trait every cache exposes, whatever its fetch strategy.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{
    CacheEngine, CacheReapPolicy, CachedItem, ExpirationPolicy, NullValuePolicy, RemovalReason,
    SubscriptionId,
};
use crate::error::Result;
use crate::fetch::FetchStrategy;

// == Cache Trait ==
/// Public contract of a keyed cache.
pub trait Cache<K, V> {
    fn item_count(&self) -> usize;
    fn current_size(&self) -> u64;

    fn max_capacity(&self) -> u64;
    fn set_max_capacity(&self, max_capacity: u64) -> Result<()>;
    fn expiration_duration(&self) -> Duration;
    fn set_expiration_duration(&self, duration: Duration) -> Result<()>;
    fn expiration_policy(&self) -> ExpirationPolicy;
    fn set_expiration_policy(&self, policy: ExpirationPolicy) -> Result<()>;
    fn reap_policy(&self) -> CacheReapPolicy;
    fn set_reap_policy(&self, policy: CacheReapPolicy) -> Result<()>;
    fn null_value_policy(&self) -> NullValuePolicy;
    fn set_null_value_policy(&self, policy: NullValuePolicy) -> Result<()>;

    /// True when `key` is stored and not expired.
    fn contains_cached_item(&self, key: &K) -> bool;

    /// Returns the value for `key`, fetching it when missing or stale.
    fn get(&self, key: &K) -> Result<Option<V>>;

    /// Async variant of [`get`](Cache::get).
    fn get_async(self: Arc<Self>, key: K) -> impl Future<Output = Result<Option<V>>> + Send + 'static
    where
        Self: Sized;

    fn bulk_load<I>(&self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>;

    /// Snapshot of every stored item, stale ones included.
    fn get_cached_items(&self) -> HashMap<K, CachedItem<V>>;

    fn invalidate(&self, key: &K);
    fn remove(&self, key: &K) -> Result<bool>;
    fn flush(&self);

    fn on_item_fetched<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&K, Option<&V>) + Send + Sync + 'static;

    fn on_item_removed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&K, &CachedItem<V>, RemovalReason) + Send + Sync + 'static;

    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

impl<K, V, S> Cache<K, V> for CacheEngine<K, V, S>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: FetchStrategy<K, V> + 'static,
{
    fn item_count(&self) -> usize {
        CacheEngine::item_count(self)
    }

    fn current_size(&self) -> u64 {
        CacheEngine::current_size(self)
    }

    fn max_capacity(&self) -> u64 {
        CacheEngine::max_capacity(self)
    }

    fn set_max_capacity(&self, max_capacity: u64) -> Result<()> {
        CacheEngine::set_max_capacity(self, max_capacity)
    }

    fn expiration_duration(&self) -> Duration {
        CacheEngine::expiration_duration(self)
    }

    fn set_expiration_duration(&self, duration: Duration) -> Result<()> {
        CacheEngine::set_expiration_duration(self, duration)
    }

    fn expiration_policy(&self) -> ExpirationPolicy {
        CacheEngine::expiration_policy(self)
    }

    fn set_expiration_policy(&self, policy: ExpirationPolicy) -> Result<()> {
        CacheEngine::set_expiration_policy(self, policy)
    }

    fn reap_policy(&self) -> CacheReapPolicy {
        CacheEngine::reap_policy(self)
    }

    fn set_reap_policy(&self, policy: CacheReapPolicy) -> Result<()> {
        CacheEngine::set_reap_policy(self, policy)
    }

    fn null_value_policy(&self) -> NullValuePolicy {
        CacheEngine::null_value_policy(self)
    }

    fn set_null_value_policy(&self, policy: NullValuePolicy) -> Result<()> {
        CacheEngine::set_null_value_policy(self, policy)
    }

    fn contains_cached_item(&self, key: &K) -> bool {
        CacheEngine::contains_cached_item(self, key)
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        CacheEngine::get(self, key)
    }

    fn get_async(self: Arc<Self>, key: K) -> impl Future<Output = Result<Option<V>>> + Send + 'static
    where
        Self: Sized,
    {
        CacheEngine::get_async(self, key)
    }

    fn bulk_load<I>(&self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        CacheEngine::bulk_load(self, pairs)
    }

    fn get_cached_items(&self) -> HashMap<K, CachedItem<V>> {
        CacheEngine::get_cached_items(self)
    }

    fn invalidate(&self, key: &K) {
        CacheEngine::invalidate(self, key)
    }

    fn remove(&self, key: &K) -> Result<bool> {
        CacheEngine::remove(self, key)
    }

    fn flush(&self) {
        CacheEngine::flush(self)
    }

    fn on_item_fetched<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&K, Option<&V>) + Send + Sync + 'static,
    {
        CacheEngine::on_item_fetched(self, callback)
    }

    fn on_item_removed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&K, &CachedItem<V>, RemovalReason) + Send + Sync + 'static,
    {
        CacheEngine::on_item_removed(self, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        CacheEngine::unsubscribe(self, id)
    }
}
