//! Cache Events Module
//!
//! Observer lists for fetch and removal notifications.
//!
//! The engine queues notifications while it holds its lock and dispatches them
//! once the lock is released, so subscribers may call back into the cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::CachedItem;

/// Callback invoked after a successful fetch.
pub type FetchedCallback<K, V> = Arc<dyn Fn(&K, Option<&V>) + Send + Sync>;

/// Callback invoked after an item leaves the cache.
pub type RemovedCallback<K, V> = Arc<dyn Fn(&K, &CachedItem<V>, RemovalReason) + Send + Sync>;

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// == Removal Reason ==
/// Why an item left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Explicit `remove`
    Removed,
    /// Reaped to make space
    Evicted,
    /// Dropped because it was stale
    Expired,
    /// Cleared by `flush` or teardown
    Flushed,
}

// == Notification ==
/// A notification raised under the engine lock, waiting for dispatch.
pub(crate) enum Notification<K, V> {
    Fetched {
        key: K,
        value: Option<V>,
    },
    Removed {
        key: K,
        item: CachedItem<V>,
        reason: RemovalReason,
    },
}

// == Observers ==
/// Subscriber lists, kept in subscription order.
pub(crate) struct Observers<K, V> {
    next_id: AtomicU64,
    fetched: RwLock<Vec<(SubscriptionId, FetchedCallback<K, V>)>>,
    removed: RwLock<Vec<(SubscriptionId, RemovedCallback<K, V>)>>,
}

impl<K, V> Observers<K, V> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            fetched: RwLock::new(Vec::new()),
            removed: RwLock::new(Vec::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn subscribe_fetched(&self, callback: FetchedCallback<K, V>) -> SubscriptionId {
        let id = self.next_id();
        self.fetched.write().push((id, callback));
        id
    }

    pub fn subscribe_removed(&self, callback: RemovedCallback<K, V>) -> SubscriptionId {
        let id = self.next_id();
        self.removed.write().push((id, callback));
        id
    }

    /// Drops the subscription with `id` from whichever list holds it.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut fetched = self.fetched.write();
        let before = fetched.len();
        fetched.retain(|(sid, _)| *sid != id);
        if fetched.len() != before {
            return true;
        }
        drop(fetched);

        let mut removed = self.removed.write();
        let before = removed.len();
        removed.retain(|(sid, _)| *sid != id);
        removed.len() != before
    }

    // == Notify ==
    /// Delivers one notification to every subscriber.
    ///
    /// The list is snapshotted first, so a callback may subscribe or
    /// unsubscribe without deadlocking; such changes apply from the next
    /// notification on.
    pub fn notify(&self, notification: &Notification<K, V>) {
        match notification {
            Notification::Fetched { key, value } => {
                let callbacks: Vec<_> = self.fetched.read().iter().map(|(_, cb)| cb.clone()).collect();
                for callback in callbacks {
                    callback(key, value.as_ref());
                }
            }
            Notification::Removed { key, item, reason } => {
                let callbacks: Vec<_> = self.removed.read().iter().map(|(_, cb)| cb.clone()).collect();
                for callback in callbacks {
                    callback(key, item, *reason);
                }
            }
        }
    }
}
