//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check capacity accounting, read idempotence and bulk-load
//! semantics over random operation sequences.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::CacheReapPolicy;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::fetch::{ActionCache, PreloadedCache};

// == Test Configuration ==
const TEST_MAX_CAPACITY: u64 = 40;

// == Strategies ==
/// Short keys so that sequences revisit the same keys often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,12}".prop_map(|s| s)
}

/// Every policy that goes through the precise eviction path
fn precise_policy_strategy() -> impl Strategy<Value = CacheReapPolicy> {
    prop_oneof![
        Just(CacheReapPolicy::LeastUsed),
        Just(CacheReapPolicy::Oldest),
        Just(CacheReapPolicy::LongestIdle),
        Just(CacheReapPolicy::Largest),
        Just(CacheReapPolicy::Smallest),
        Just(CacheReapPolicy::None),
    ]
}

#[derive(Debug, Clone)]
enum CacheOp {
    Get { key: String },
    Load { key: String, value: String },
    Remove { key: String },
    Invalidate { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        2 => (key_strategy(), "[a-z]{0,16}").prop_map(|(key, value)| CacheOp::Load { key, value }),
        1 => key_strategy().prop_map(|key| CacheOp::Remove { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Invalidate { key }),
    ]
}

/// Values are the key itself, sized by length
fn length_sized_cache(config: CacheConfig) -> ActionCache<String, String> {
    ActionCache::with_size_estimator(
        config,
        |key: &String| Some(key.clone()),
        |value: &String| value.len() as u32,
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any sequence of operations under a precise reap policy, every call
    // that does not fail leaves current_size within max_capacity, and
    // current_size always equals the sum of the stored item sizes.
    #[test]
    fn prop_capacity_invariant(
        policy in precise_policy_strategy(),
        ops in prop::collection::vec(cache_op_strategy(), 1..80)
    ) {
        let cache = length_sized_cache(
            CacheConfig::default()
                .with_max_capacity(TEST_MAX_CAPACITY)
                .with_reap_policy(policy),
        );

        for op in ops {
            let result = match op {
                CacheOp::Get { key } => cache.get(&key).map(|_| ()),
                CacheOp::Load { key, value } => cache.bulk_load(vec![(key, value)]),
                CacheOp::Remove { key } => cache.remove(&key).map(|_| ()),
                CacheOp::Invalidate { key } => {
                    cache.invalidate(&key);
                    Ok(())
                }
            };

            if let Err(err) = result {
                prop_assert!(matches!(err, CacheError::CapacityExceeded(_)), "unexpected error {:?}", err);
            }
            prop_assert!(
                cache.current_size() <= TEST_MAX_CAPACITY,
                "current size {} exceeds max {}",
                cache.current_size(),
                TEST_MAX_CAPACITY
            );

            let accounted: u64 = cache
                .get_cached_items()
                .values()
                .map(|item| u64::from(item.size()))
                .sum();
            prop_assert_eq!(accounted, cache.current_size());
        }
    }

    // Two back-to-back reads with nothing in between return the same value
    // and only the first one reaches the fetch function.
    #[test]
    fn prop_fresh_read_is_idempotent(keys in prop::collection::vec(key_strategy(), 1..30)) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cache: ActionCache<String, usize> = ActionCache::new(CacheConfig::default(), move |key: &String| {
            Some(counter.fetch_add(1, Ordering::SeqCst) + key.len())
        })
        .unwrap();

        for key in keys {
            let first = cache.get(&key).unwrap();
            let fetched = calls.load(Ordering::SeqCst);
            let second = cache.get(&key).unwrap();

            prop_assert_eq!(first, second);
            prop_assert_eq!(calls.load(Ordering::SeqCst), fetched);
        }
    }

    // Bulk-loading a new value over an existing key swaps the value but keeps
    // the size accounted at insertion.
    #[test]
    fn prop_bulk_update_keeps_accounted_size(
        key in key_strategy(),
        replacement in "[a-z]{0,64}"
    ) {
        let cache = length_sized_cache(CacheConfig::default());
        cache.get(&key).unwrap();
        let size_before = cache.current_size();

        cache.bulk_load(vec![(key.clone(), replacement.clone())]).unwrap();

        prop_assert_eq!(cache.current_size(), size_before);
        prop_assert_eq!(cache.get(&key).unwrap(), Some(replacement));
    }

    // A bulk fetch cache refuses single-key removal, present key or not.
    #[test]
    fn prop_bulk_cache_refuses_removal(
        entries in prop::collection::hash_map(key_strategy(), any::<u32>(), 0..10),
        probe in key_strategy(),
        warm in any::<bool>()
    ) {
        let cache = PreloadedCache::preloaded(entries.clone()).unwrap();
        if warm {
            let _ = cache.get(&probe);
        }

        let result = cache.remove(&probe);
        prop_assert!(matches!(result, Err(CacheError::UnsupportedOperation(_))));
        if warm {
            prop_assert_eq!(cache.item_count(), entries.len() + usize::from(!entries.contains_key(&probe)));
        }
    }

    // A preloaded cache serves its map from one load until explicitly refreshed.
    #[test]
    fn prop_preloaded_fetches_once(
        entries in prop::collection::hash_map(key_strategy(), any::<u32>(), 1..10),
        rounds in 1usize..5
    ) {
        let cache = PreloadedCache::preloaded(entries.clone()).unwrap();

        for _ in 0..rounds {
            for (key, value) in &entries {
                prop_assert_eq!(cache.get(key).unwrap(), Some(*value));
            }
        }
        prop_assert_eq!(cache.fetch_count(), 1);

        cache.force_refresh().unwrap();
        prop_assert_eq!(cache.fetch_count(), 2);
        let snapshot: HashMap<String, u32> = cache
            .get_cached_items()
            .into_iter()
            .filter_map(|(key, item)| item.value().copied().map(|v| (key, v)))
            .collect();
        prop_assert_eq!(snapshot, entries);
    }
}
