//! Eviction Planning Module
//!
//! Decides which keys to reap when the engine needs space.
//!
//! Two planners exist:
//! - [`order_candidates`] for the precise path: every key is ranked, expired
//!   items first, then by the reap policy's secondary ordering. The engine walks
//!   the ranking and stops once enough space is free.
//! - [`select_fast`] for `Asap`: one unordered pass that grabs expired items and
//!   then anything else until the requested amount is covered.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::cache::{CacheReapPolicy, CachedItem};

// == Candidate ==
/// Snapshot of the metadata one eviction decision needs.
#[derive(Debug, Clone)]
pub(crate) struct Candidate<K> {
    pub key: K,
    pub expired: bool,
    pub accessed_count: u32,
    pub size: u32,
    pub fetched_on: DateTime<Utc>,
    pub last_accessed_on: DateTime<Utc>,
}

impl<K> Candidate<K> {
    pub fn from_item<V>(key: K, item: &CachedItem<V>, expired: bool) -> Self {
        Self {
            key,
            expired,
            accessed_count: item.accessed_count(),
            size: item.size(),
            fetched_on: item.fetched_on(),
            last_accessed_on: item.last_accessed_on(),
        }
    }
}

// == Order Candidates ==
/// Ranks candidates for the precise eviction path.
///
/// Returns `true` when every remaining candidate must be reaped regardless of
/// how much space that frees (policy `None`).
///
/// # Arguments
/// * `candidates` - All stored keys, reordered (and for `None`, filtered) in place
/// * `policy` - The active reap policy
/// * `expiration_enabled` - Whether an expiration policy is configured
pub(crate) fn order_candidates<K>(
    candidates: &mut Vec<Candidate<K>>,
    policy: CacheReapPolicy,
    expiration_enabled: bool,
) -> bool {
    let secondary: fn(&Candidate<K>, &Candidate<K>) -> Ordering = match policy {
        CacheReapPolicy::LeastUsed => |a, b| {
            a.accessed_count
                .cmp(&b.accessed_count)
                .then_with(|| b.size.cmp(&a.size))
        },
        CacheReapPolicy::Oldest => |a, b| a.fetched_on.cmp(&b.fetched_on),
        // Earliest last access is the longest idle
        CacheReapPolicy::LongestIdle => |a, b| a.last_accessed_on.cmp(&b.last_accessed_on),
        CacheReapPolicy::Largest => |a, b| b.size.cmp(&a.size),
        CacheReapPolicy::Smallest => |a, b| a.size.cmp(&b.size),
        CacheReapPolicy::None | CacheReapPolicy::Asap => {
            if expiration_enabled {
                candidates.retain(|c| c.expired);
            } else {
                candidates.clear();
            }
            return true;
        }
    };

    candidates.sort_by(|a, b| b.expired.cmp(&a.expired).then_with(|| secondary(a, b)));
    false
}

// == Select Fast ==
/// Picks victims for the `Asap` fast path in iteration order.
///
/// Expired candidates are taken first; if their summed size does not reach
/// `requested`, the pass continues over the live ones. The selection may fall
/// short of `requested` when the cache simply does not hold enough.
pub(crate) fn select_fast<K: Clone>(candidates: &[Candidate<K>], requested: u64) -> Vec<K> {
    let mut death_row = Vec::new();
    let mut freed: u64 = 0;

    if requested == 0 {
        return death_row;
    }

    for expired_pass in [true, false] {
        for candidate in candidates.iter().filter(|c| c.expired == expired_pass) {
            if freed >= requested {
                return death_row;
            }
            freed += u64::from(candidate.size);
            death_row.push(candidate.key.clone());
        }
    }

    death_row
}
