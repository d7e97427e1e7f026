//! Cache Entry Module
//!
//! Defines the metadata envelope stored for every cached value.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::ExpirationPolicy;

// == Cached Item ==
/// One stored entry: the value plus the bookkeeping the reap policies sort on.
///
/// Access metadata is atomic so that cache hits can be recorded while only the
/// read side of the engine lock is held.
#[derive(Debug)]
pub struct CachedItem<V> {
    /// The cached payload, `None` for a cached null
    value: Option<V>,
    /// Insertion timestamp, set once
    fetched_on: DateTime<Utc>,
    /// Last successful access (Unix microseconds)
    last_accessed_micros: AtomicI64,
    /// Number of successful accesses
    accessed_count: AtomicU32,
    /// Estimated size, computed once at insertion
    size: u32,
    /// Sticky invalidation flag
    invalidated: AtomicBool,
}

impl<V> CachedItem<V> {
    // == Constructor ==
    /// Creates a new item stamped with the current time.
    ///
    /// # Arguments
    /// * `value` - The value to store, `None` for a null
    /// * `size` - Size in capacity units, as reported by the size estimator
    pub fn new(value: Option<V>, size: u32) -> Self {
        // Truncate to the same microsecond resolution as the access clock
        let micros = Utc::now().timestamp_micros();
        let now = DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now);
        Self {
            value,
            fetched_on: now,
            last_accessed_micros: AtomicI64::new(micros),
            accessed_count: AtomicU32::new(0),
            size,
            invalidated: AtomicBool::new(false),
        }
    }

    /// Returns the cached value, `None` for a cached null.
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn fetched_on(&self) -> DateTime<Utc> {
        self.fetched_on
    }

    pub fn last_accessed_on(&self) -> DateTime<Utc> {
        let micros = self.last_accessed_micros.load(Ordering::Relaxed);
        DateTime::from_timestamp_micros(micros).unwrap_or(self.fetched_on)
    }

    pub fn accessed_count(&self) -> u32 {
        self.accessed_count.load(Ordering::Relaxed)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Relaxed)
    }

    // == Invalidate ==
    /// Marks the item stale. The flag is never cleared.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Relaxed);
    }

    // == Touch ==
    /// Records a successful access.
    pub(crate) fn touch(&self) {
        self.last_accessed_micros
            .store(Utc::now().timestamp_micros(), Ordering::Relaxed);
        let _ = self
            .accessed_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1));
    }

    // == Replace Value ==
    /// Swaps the payload in place and refreshes the access time.
    ///
    /// The accounted size is deliberately left as it was at insertion.
    pub(crate) fn replace_value(&mut self, value: Option<V>) -> Option<V> {
        *self.last_accessed_micros.get_mut() = Utc::now().timestamp_micros();
        std::mem::replace(&mut self.value, value)
    }

    // == Is Expired ==
    /// Checks whether the item is stale at `now`.
    ///
    /// Invalidated items are always stale. Otherwise the item is stale once more
    /// than `duration` has elapsed since the reference time picked by `policy`.
    pub fn is_expired(
        &self,
        policy: ExpirationPolicy,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        if self.is_invalidated() {
            return true;
        }
        let reference = match policy {
            ExpirationPolicy::None => return false,
            ExpirationPolicy::SinceFetchedTime => self.fetched_on,
            ExpirationPolicy::SinceLastAccessedTime => self.last_accessed_on(),
        };
        // A reference time in the future (clock skew) counts as fresh
        match (now - reference).to_std() {
            Ok(elapsed) => elapsed > duration,
            Err(_) => false,
        }
    }
}

impl<V: Clone> Clone for CachedItem<V> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            fetched_on: self.fetched_on,
            last_accessed_micros: AtomicI64::new(self.last_accessed_micros.load(Ordering::Relaxed)),
            accessed_count: AtomicU32::new(self.accessed_count()),
            size: self.size,
            invalidated: AtomicBool::new(self.is_invalidated()),
        }
    }
}
