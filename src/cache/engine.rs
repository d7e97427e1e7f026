//! Cache Engine Module
//!
//! Main cache engine combining keyed storage, capacity enforcement, expiry and
//! a pluggable fetch strategy behind a single reader/writer lock.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::eviction::{order_candidates, select_fast, Candidate};
use crate::cache::events::{Notification, Observers, RemovalReason, SubscriptionId};
use crate::cache::{
    CacheReapPolicy, CacheStats, CachedItem, ExpirationPolicy, NullValuePolicy,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::fetch::{FetchStrategy, SizeEstimator};

// == Cache State ==
/// Everything guarded by the engine lock.
pub(crate) struct CacheState<K, V> {
    storage: HashMap<K, CachedItem<V>>,
    current_size: u64,
    config: CacheConfig,
}

impl<K, V> CacheState<K, V> {
    fn is_expired(&self, item: &CachedItem<V>, now: DateTime<Utc>) -> bool {
        item.is_expired(
            self.config.expiration_policy,
            self.config.expiration_duration,
            now,
        )
    }
}

/// Outcome of a locked lookup.
pub(crate) enum Lookup<V> {
    Hit(Option<V>),
    Fetched(Option<V>),
}

// == Write Scope ==
/// Exclusive access to the cache contents for the duration of one mutation.
///
/// Fetch strategies receive a scope so they can flush and bulk-load the cache
/// without taking the lock a second time. Notifications raised through the
/// scope are delivered once the lock has been released.
pub struct WriteScope<'a, K, V> {
    state: &'a mut CacheState<K, V>,
    sizer: &'a dyn SizeEstimator<V>,
    pending: Vec<Notification<K, V>>,
}

impl<'a, K, V> WriteScope<'a, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn new(state: &'a mut CacheState<K, V>, sizer: &'a dyn SizeEstimator<V>) -> Self {
        Self {
            state,
            sizer,
            pending: Vec::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.state.config
    }

    pub fn item_count(&self) -> usize {
        self.state.storage.len()
    }

    pub fn current_size(&self) -> u64 {
        self.state.current_size
    }

    pub fn contains_cached_item(&self, key: &K) -> bool {
        let now = Utc::now();
        self.state
            .storage
            .get(key)
            .is_some_and(|item| !self.state.is_expired(item, now))
    }

    /// The stored item for `key`, stale or not.
    pub fn cached_item(&self, key: &K) -> Option<&CachedItem<V>> {
        self.state.storage.get(key)
    }

    // == Flush ==
    /// Removes every entry. Returns the number of entries removed.
    pub fn flush(&mut self) -> usize {
        let count = self.state.storage.len();
        for (key, item) in self.state.storage.drain() {
            self.pending.push(Notification::Removed {
                key,
                item,
                reason: RemovalReason::Flushed,
            });
        }
        self.state.current_size = 0;
        info!(count, "cache flushed");
        count
    }

    // == Bulk Load ==
    /// Loads many pairs at once.
    ///
    /// Existing keys get their value replaced in place and their access time
    /// refreshed; their accounted size is not recomputed and no capacity check
    /// runs for them. New keys are inserted with the same capacity enforcement
    /// as a fetch.
    pub fn bulk_load<I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut inserted = 0usize;
        let mut updated = 0usize;

        for (key, value) in pairs {
            if let Some(item) = self.state.storage.get_mut(&key) {
                item.replace_value(Some(value));
                updated += 1;
                continue;
            }
            let size = self.sizer.estimate_size(&value);
            self.insert(key, CachedItem::new(Some(value), size))?;
            inserted += 1;
        }

        debug!(inserted, updated, "bulk load applied");
        Ok(())
    }

    // == Purge Expired ==
    /// Removes every expired entry. Returns the number of entries removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Utc::now();
        let expired: Vec<K> = self
            .state
            .storage
            .iter()
            .filter(|(_, item)| self.state.is_expired(item, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key, RemovalReason::Expired);
        }
        expired.len()
    }

    pub(crate) fn into_pending(self) -> Vec<Notification<K, V>> {
        self.pending
    }

    // == Get Or Fetch ==
    /// Serves `key` from storage when fresh, otherwise fetches and stores it.
    pub(crate) fn get_or_fetch<F>(&mut self, key: &K, strategy: &F) -> Result<Lookup<V>>
    where
        F: FetchStrategy<K, V> + ?Sized,
    {
        let now = Utc::now();
        if let Some(item) = self.state.storage.get(key) {
            if !self.state.is_expired(item, now) {
                item.touch();
                return Ok(Lookup::Hit(item.value().cloned()));
            }
        }

        let value = strategy.fetch(key, self)?;
        let null_policy = self.state.config.null_value_policy;
        if value.is_none() && null_policy == NullValuePolicy::Throw {
            return Err(CacheError::NullValueProhibited(format!(
                "fetch for key {:?} returned no value",
                key
            )));
        }

        // A bulk strategy may already have stored the key while fetching
        if self.contains_cached_item(key) {
            if let Some(item) = self.state.storage.get(key) {
                item.touch();
            }
        } else {
            self.remove_entry(key, RemovalReason::Expired);
            let size = value
                .as_ref()
                .map_or(0, |v| self.sizer.estimate_size(v));
            let item = CachedItem::new(value.clone(), size);
            if value.is_none() && null_policy == NullValuePolicy::ReturnButDontCache {
                item.invalidate();
            }
            self.insert(key.clone(), item)?;
            if let Some(item) = self.state.storage.get(key) {
                item.touch();
            }
        }

        debug!(?key, "item fetched");
        self.pending.push(Notification::Fetched {
            key: key.clone(),
            value: value.clone(),
        });
        Ok(Lookup::Fetched(value))
    }

    // == Remove Entry ==
    /// Removes `key` if present, releasing its size.
    pub(crate) fn remove_entry(&mut self, key: &K, reason: RemovalReason) -> bool {
        let Some(item) = self.state.storage.remove(key) else {
            return false;
        };
        self.state.current_size = self
            .state
            .current_size
            .saturating_sub(u64::from(item.size()));
        debug!(?key, ?reason, size = item.size(), "item removed");
        self.pending.push(Notification::Removed {
            key: key.clone(),
            item,
            reason,
        });
        true
    }

    // == Resize ==
    /// Applies a new capacity, reaping immediately if the cache no longer fits.
    ///
    /// On failure the previous capacity is restored; items already reaped stay
    /// gone.
    pub(crate) fn resize(&mut self, max_capacity: u64) -> Result<()> {
        let previous = self.state.config.max_capacity;
        self.state.config.max_capacity = max_capacity;
        if self.state.current_size <= max_capacity {
            return Ok(());
        }

        if self.state.config.reap_policy == CacheReapPolicy::Asap {
            let deficit = self.state.current_size - max_capacity;
            self.make_space_fast(deficit);
            return Ok(());
        }

        if let Err(err) = self.make_space(0) {
            self.state.config.max_capacity = previous;
            return Err(err);
        }
        Ok(())
    }

    fn insert(&mut self, key: K, item: CachedItem<V>) -> Result<()> {
        let size = u64::from(item.size());
        if !self.has_room(size) {
            if self.state.config.reap_policy == CacheReapPolicy::Asap {
                let deficit = self
                    .state
                    .current_size
                    .saturating_add(size)
                    .saturating_sub(self.state.config.max_capacity);
                self.make_space_fast(deficit);
            } else {
                self.make_space(size)?;
            }
        }

        self.state.current_size = self.state.current_size.saturating_add(size);
        if let Some(replaced) = self.state.storage.insert(key.clone(), item) {
            self.state.current_size = self
                .state
                .current_size
                .saturating_sub(u64::from(replaced.size()));
            self.pending.push(Notification::Removed {
                key,
                item: replaced,
                reason: RemovalReason::Removed,
            });
        }
        Ok(())
    }

    fn has_room(&self, requested: u64) -> bool {
        self.state.current_size.saturating_add(requested) <= self.state.config.max_capacity
    }

    fn candidates(&self) -> Vec<Candidate<K>> {
        let now = Utc::now();
        self.state
            .storage
            .iter()
            .map(|(key, item)| {
                Candidate::from_item(key.clone(), item, self.state.is_expired(item, now))
            })
            .collect()
    }

    // == Make Space ==
    /// Precise eviction: ranks every item and reaps until `requested` fits.
    ///
    /// # Errors
    /// - `CapacityExceeded` if `requested` is larger than the whole cache
    /// - `CapacityExceeded` if the reap pass could not free enough
    fn make_space(&mut self, requested: u64) -> Result<()> {
        let max_capacity = self.state.config.max_capacity;
        if requested > max_capacity {
            warn!(requested, max_capacity, "item larger than cache capacity");
            return Err(CacheError::CapacityExceeded(format!(
                "requested size {} exceeds max capacity {}",
                requested, max_capacity
            )));
        }

        let mut candidates = self.candidates();
        let reap_all = order_candidates(
            &mut candidates,
            self.state.config.reap_policy,
            self.state.config.expiration_enabled(),
        );

        for candidate in candidates {
            if !reap_all && self.has_room(requested) {
                break;
            }
            self.remove_entry(&candidate.key, RemovalReason::Evicted);
        }

        if !self.has_room(requested) {
            warn!(
                requested,
                current_size = self.state.current_size,
                max_capacity,
                "unable to make space"
            );
            return Err(CacheError::CapacityExceeded(format!(
                "unable to fit size {} even after reap (current size {}, max capacity {})",
                requested, self.state.current_size, max_capacity
            )));
        }
        Ok(())
    }

    // == Make Space Fast ==
    /// Approximate eviction for `Asap`: no ordering and no post-condition, so
    /// the cache may stay over capacity when it lacks enough evictable items.
    fn make_space_fast(&mut self, requested: u64) {
        let victims = select_fast(&self.candidates(), requested);
        for key in &victims {
            self.remove_entry(key, RemovalReason::Evicted);
        }
    }
}

// == Cache Engine ==
/// A capacity-bounded cache generic over key, value and fetch strategy.
///
/// One reader/writer lock guards the whole instance. Hits run under the read
/// side; every mutation, including the fetch itself, holds the write side.
pub struct CacheEngine<K, V, S> {
    state: RwLock<CacheState<K, V>>,
    strategy: S,
    observers: Observers<K, V>,
    stats: Mutex<CacheStats>,
}

impl<K, V, S> CacheEngine<K, V, S> {
    // == Dispatch ==
    /// Delivers queued notifications: internal bookkeeping first, then
    /// subscribers. Removed items are dropped here, after every listener saw them.
    fn dispatch(&self, pending: Vec<Notification<K, V>>) {
        for notification in pending {
            {
                let mut stats = self.stats.lock();
                match &notification {
                    Notification::Fetched { .. } => stats.record_fetch(),
                    Notification::Removed {
                        reason: RemovalReason::Evicted,
                        ..
                    } => stats.record_eviction(),
                    Notification::Removed { .. } => stats.record_removal(),
                }
            }
            self.observers.notify(&notification);
        }
    }

    /// The fetch strategy this cache was built with.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }
}

impl<K, V, S> CacheEngine<K, V, S>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
    S: FetchStrategy<K, V>,
{
    // == Constructor ==
    /// Creates an empty cache driven by `strategy`.
    ///
    /// # Errors
    /// - `InvalidConfig` if `config` fails validation
    pub fn with_strategy(config: CacheConfig, strategy: S) -> Result<Self> {
        config.validate()?;
        debug!(?config, "cache created");
        Ok(Self {
            state: RwLock::new(CacheState {
                storage: HashMap::new(),
                current_size: 0,
                config,
            }),
            strategy,
            observers: Observers::new(),
            stats: Mutex::new(CacheStats::new()),
        })
    }

    /// Runs `op` under the write lock and dispatches whatever it raised.
    pub(crate) fn with_write_scope<R>(
        &self,
        op: impl FnOnce(&mut WriteScope<'_, K, V>, &S) -> R,
    ) -> R {
        let (result, pending) = {
            let mut state = self.state.write();
            let mut scope = WriteScope::new(&mut *state, &self.strategy);
            let result = op(&mut scope, &self.strategy);
            (result, scope.into_pending())
        };
        self.dispatch(pending);
        result
    }

    // == Get ==
    /// Returns the value for `key`, fetching it on a miss or when stale.
    ///
    /// The first check runs under the read lock. On a miss the write lock is
    /// taken and the key re-checked before fetching, so concurrent misses for
    /// the same key fetch once.
    ///
    /// # Errors
    /// - Any error raised by the fetch strategy
    /// - `NullValueProhibited` for a null fetch under `NullValuePolicy::Throw`
    /// - `CapacityExceeded` if the fetched item cannot be made to fit
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        {
            let state = self.state.read();
            if let Some(item) = state.storage.get(key) {
                if !state.is_expired(item, Utc::now()) {
                    item.touch();
                    let value = item.value().cloned();
                    drop(state);
                    self.stats.lock().record_hit();
                    return Ok(value);
                }
            }
        }

        let result = self.with_write_scope(|scope, strategy| scope.get_or_fetch(key, strategy));
        let mut stats = self.stats.lock();
        match result {
            Ok(Lookup::Hit(value)) => {
                stats.record_hit();
                Ok(value)
            }
            Ok(Lookup::Fetched(value)) => {
                stats.record_miss();
                Ok(value)
            }
            Err(err) => {
                stats.record_miss();
                Err(err)
            }
        }
    }

    // == Contains Cached Item ==
    /// True when `key` is stored and not expired. Never fetches.
    pub fn contains_cached_item(&self, key: &K) -> bool {
        let state = self.state.read();
        let now = Utc::now();
        state
            .storage
            .get(key)
            .is_some_and(|item| !state.is_expired(item, now))
    }

    // == Invalidate ==
    /// Marks `key` stale so the next `get` refetches it. No-op when absent.
    pub fn invalidate(&self, key: &K) {
        if let Some(item) = self.state.read().storage.get(key) {
            item.invalidate();
            debug!(?key, "item invalidated");
        }
    }

    // == Remove ==
    /// Deletes `key`. Returns whether an entry was removed.
    ///
    /// # Errors
    /// - `UnsupportedOperation` if the strategy refreshes the cache as a unit
    pub fn remove(&self, key: &K) -> Result<bool> {
        if !self.strategy.supports_remove() {
            return Err(CacheError::UnsupportedOperation(
                "remove is not supported by bulk fetch caches".to_string(),
            ));
        }
        Ok(self.with_write_scope(|scope, _| scope.remove_entry(key, RemovalReason::Removed)))
    }

    // == Flush ==
    /// Removes every entry.
    pub fn flush(&self) {
        self.with_write_scope(|scope, _| scope.flush());
    }

    // == Bulk Load ==
    /// Loads many pairs under one write lock. See [`WriteScope::bulk_load`].
    pub fn bulk_load<I>(&self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.with_write_scope(|scope, _| scope.bulk_load(pairs))
    }

    // == Purge Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let removed = self.with_write_scope(|scope, _| scope.purge_expired());
        if removed > 0 {
            info!(removed, "expired items purged");
        }
        removed
    }

    // == Snapshot ==
    /// Copies the current item map.
    pub fn get_cached_items(&self) -> HashMap<K, CachedItem<V>> {
        self.state.read().storage.clone()
    }

    pub fn item_count(&self) -> usize {
        self.state.read().storage.len()
    }

    pub fn current_size(&self) -> u64 {
        self.state.read().current_size
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let (total_entries, current_size) = {
            let state = self.state.read();
            (state.storage.len(), state.current_size)
        };
        let mut stats = self.stats.lock().clone();
        stats.total_entries = total_entries;
        stats.current_size = current_size;
        stats
    }

    // == Configuration ==
    /// Returns a copy of the active configuration.
    pub fn config(&self) -> CacheConfig {
        self.state.read().config.clone()
    }

    pub fn max_capacity(&self) -> u64 {
        self.state.read().config.max_capacity
    }

    pub fn expiration_duration(&self) -> Duration {
        self.state.read().config.expiration_duration
    }

    pub fn expiration_policy(&self) -> ExpirationPolicy {
        self.state.read().config.expiration_policy
    }

    pub fn reap_policy(&self) -> CacheReapPolicy {
        self.state.read().config.reap_policy
    }

    pub fn null_value_policy(&self) -> NullValuePolicy {
        self.state.read().config.null_value_policy
    }

    /// Changes the capacity, reaping at once if the cache no longer fits.
    ///
    /// # Errors
    /// - `InvalidConfig` for a zero capacity
    /// - `CapacityExceeded` if the reap pass could not get under the new
    ///   ceiling; the previous capacity stays in effect
    pub fn set_max_capacity(&self, max_capacity: u64) -> Result<()> {
        self.config().with_max_capacity(max_capacity).validate()?;
        self.with_write_scope(|scope, _| scope.resize(max_capacity))
    }

    pub fn set_expiration_duration(&self, duration: Duration) -> Result<()> {
        self.reconfigure(|config| config.expiration_duration = duration)
    }

    pub fn set_expiration_policy(&self, policy: ExpirationPolicy) -> Result<()> {
        self.reconfigure(|config| config.expiration_policy = policy)
    }

    pub fn set_reap_policy(&self, policy: CacheReapPolicy) -> Result<()> {
        self.reconfigure(|config| config.reap_policy = policy)
    }

    pub fn set_null_value_policy(&self, policy: NullValuePolicy) -> Result<()> {
        self.reconfigure(|config| config.null_value_policy = policy)
    }

    fn reconfigure(&self, change: impl FnOnce(&mut CacheConfig)) -> Result<()> {
        let mut state = self.state.write();
        let mut config = state.config.clone();
        change(&mut config);
        config.validate()?;
        debug!(?config, "cache reconfigured");
        state.config = config;
        Ok(())
    }

    // == Subscriptions ==
    /// Subscribes to successful fetches.
    pub fn on_item_fetched<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&K, Option<&V>) + Send + Sync + 'static,
    {
        self.observers.subscribe_fetched(Arc::new(callback))
    }

    /// Subscribes to items leaving the cache, with the reason they left.
    pub fn on_item_removed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&K, &CachedItem<V>, RemovalReason) + Send + Sync + 'static,
    {
        self.observers.subscribe_removed(Arc::new(callback))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}

impl<K, V, S> CacheEngine<K, V, S>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: FetchStrategy<K, V> + 'static,
{
    // == Get Async ==
    /// Async variant of [`get`](Self::get).
    ///
    /// A fresh item is served inline. Otherwise the lookup moves to the
    /// blocking pool; the read lock used for the check is released first.
    ///
    /// # Errors
    /// - Same as [`get`](Self::get)
    /// - `Internal` if the blocking worker panicked
    pub async fn get_async(self: Arc<Self>, key: K) -> Result<Option<V>> {
        if self.contains_cached_item(&key) {
            return self.get(&key);
        }

        tokio::task::spawn_blocking(move || self.get(&key))
            .await
            .map_err(|e| CacheError::Internal(format!("get_async worker failed: {}", e)))?
    }
}

impl<K, V, S> Drop for CacheEngine<K, V, S> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.current_size = 0;
        let pending: Vec<_> = state
            .storage
            .drain()
            .map(|(key, item)| Notification::Removed {
                key,
                item,
                reason: RemovalReason::Flushed,
            })
            .collect();
        self.dispatch(pending);
    }
}
