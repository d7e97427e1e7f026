//! Integration Tests for the public cache API
//!
//! Drives each cache flavour through the `Cache` contract the way a consumer
//! would: configuration, lookups, reaping, notifications and async access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

use cache_engine::cache::RemovalReason;
use cache_engine::{
    ActionCache, BulkFetchCache, Cache, CacheConfig, CacheError, CacheExt, CacheReapPolicy,
    ExpirationPolicy, NullValuePolicy, PreloadedCache,
};

// == Helper Functions ==

fn sized_cache(config: CacheConfig, calls: Arc<AtomicUsize>) -> ActionCache<String, String> {
    ActionCache::with_size_estimator(
        config,
        move |key: &String| {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(format!("value-of-{}", key))
        },
        |value: &String| value.len() as u32,
    )
    .unwrap()
}

fn key(s: &str) -> String {
    s.to_string()
}

// == Action Cache ==

#[test]
fn test_expiry_since_fetch_refetches_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = CacheConfig::default()
        .with_expiration(ExpirationPolicy::SinceFetchedTime, Duration::from_millis(200));
    let cache = sized_cache(config, calls.clone());

    cache.get(&key("k")).unwrap();
    sleep(Duration::from_millis(350));
    cache.get(&key("k")).unwrap();
    cache.get(&key("k")).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_idle_expiry_is_reset_by_access() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = CacheConfig::default()
        .with_expiration(ExpirationPolicy::SinceLastAccessedTime, Duration::from_millis(200));
    let cache = sized_cache(config, calls.clone());

    // Total time well past the window, but no single gap comes close to it
    cache.get(&key("k")).unwrap();
    for _ in 0..6 {
        sleep(Duration::from_millis(50));
        cache.get(&key("k")).unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    sleep(Duration::from_millis(400));
    cache.get(&key("k")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_oldest_policy_reaps_first_fetched() {
    let calls = Arc::new(AtomicUsize::new(0));
    // "value-of-x" is 10 units
    let config = CacheConfig::default()
        .with_max_capacity(30)
        .with_reap_policy(CacheReapPolicy::Oldest);
    let cache = sized_cache(config, calls);

    for name in ["a", "b", "c"] {
        cache.get(&key(name)).unwrap();
        sleep(Duration::from_millis(5));
    }
    // Access "a" a lot; Oldest ignores it
    for _ in 0..5 {
        cache.get(&key("a")).unwrap();
    }

    cache.get(&key("d")).unwrap();
    assert!(!cache.contains_cached_item(&key("a")));
    assert!(cache.contains_cached_item(&key("b")));
    assert_eq!(cache.current_size(), 30);
}

#[test]
fn test_longest_idle_policy_reaps_least_recent() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = CacheConfig::default()
        .with_max_capacity(30)
        .with_reap_policy(CacheReapPolicy::LongestIdle);
    let cache = sized_cache(config, calls);

    for name in ["a", "b", "c"] {
        cache.get(&key(name)).unwrap();
        sleep(Duration::from_millis(5));
    }
    cache.get(&key("a")).unwrap();
    sleep(Duration::from_millis(5));

    cache.get(&key("d")).unwrap();
    assert!(cache.contains_cached_item(&key("a")));
    assert!(!cache.contains_cached_item(&key("b")));
}

#[test]
fn test_expired_items_reaped_before_live_ones() {
    let calls = Arc::new(AtomicUsize::new(0));
    // 10 + 11 + 10 units
    let config = CacheConfig::default()
        .with_max_capacity(31)
        .with_reap_policy(CacheReapPolicy::Largest);
    let cache = sized_cache(config, calls);

    cache.get(&key("a")).unwrap();
    cache.get(&key("bb")).unwrap();
    cache.get(&key("c")).unwrap();
    // Largest would pick "bb", but "c" is stale
    cache.invalidate(&key("c"));

    cache.get(&key("d")).unwrap();
    assert!(cache.contains_cached_item(&key("bb")));
    assert!(!cache.get_cached_items().contains_key(&key("c")));
}

#[test]
fn test_null_throw_leaves_no_entry() {
    let cache: ActionCache<u32, String> = ActionCache::new(
        CacheConfig::default().with_null_value_policy(NullValuePolicy::Throw),
        |_: &u32| None,
    )
    .unwrap();

    let result = cache.get(&42);
    assert!(matches!(result, Err(CacheError::NullValueProhibited(_))));
    assert!(!cache.contains_cached_item(&42));
    assert_eq!(cache.item_count(), 0);
}

#[test]
fn test_notification_order_and_reasons() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = CacheConfig::default()
        .with_max_capacity(20)
        .with_reap_policy(CacheReapPolicy::Oldest);
    let cache = sized_cache(config, calls);
    let log = Arc::new(Mutex::new(Vec::new()));

    let fetched_log = log.clone();
    cache.on_item_fetched(move |key, _| fetched_log.lock().unwrap().push(format!("fetched {}", key)));
    let removed_log = log.clone();
    let id = cache.on_item_removed(move |key, _, reason| {
        removed_log.lock().unwrap().push(format!("removed {} ({:?})", key, reason))
    });

    cache.get(&key("a")).unwrap();
    sleep(Duration::from_millis(5));
    cache.get(&key("b")).unwrap();
    cache.get(&key("c")).unwrap();
    assert!(cache.unsubscribe(id));
    cache.flush();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["fetched a", "fetched b", "removed a (Evicted)", "fetched c"]
    );
    let stats = cache.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.removals, 2);
}

#[test]
fn test_runtime_reconfiguration() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = sized_cache(CacheConfig::default(), calls.clone());
    cache.get(&key("k")).unwrap();

    cache.set_expiration_duration(Duration::from_millis(100)).unwrap();
    cache.set_expiration_policy(ExpirationPolicy::SinceFetchedTime).unwrap();
    assert_eq!(cache.expiration_policy(), ExpirationPolicy::SinceFetchedTime);

    sleep(Duration::from_millis(250));
    assert!(!cache.contains_cached_item(&key("k")));
    cache.get(&key("k")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    cache.set_expiration_duration(Duration::ZERO).unwrap_err();
    assert_eq!(cache.expiration_duration(), Duration::from_millis(100));
}

#[test]
fn test_removal_reasons_reach_subscribers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = CacheConfig::default()
        .with_max_capacity(20)
        .with_reap_policy(CacheReapPolicy::Oldest);
    let cache = sized_cache(config, calls);
    let reasons = Arc::new(Mutex::new(Vec::new()));

    let log = reasons.clone();
    cache.on_item_removed(move |key, _, reason| log.lock().unwrap().push((key.clone(), reason)));

    cache.get(&key("a")).unwrap();
    sleep(Duration::from_millis(5));
    cache.get(&key("b")).unwrap();
    cache.get(&key("c")).unwrap();
    cache.remove(&key("b")).unwrap();
    cache.invalidate(&key("c"));
    assert_eq!(cache.purge_expired(), 1);
    cache.get(&key("d")).unwrap();
    cache.flush();

    assert_eq!(
        *reasons.lock().unwrap(),
        vec![
            (key("a"), RemovalReason::Evicted),
            (key("b"), RemovalReason::Removed),
            (key("c"), RemovalReason::Expired),
            (key("d"), RemovalReason::Flushed),
        ]
    );
}

// == Bulk Caches ==

#[test]
fn test_preloaded_cache_serves_until_refresh() {
    let cache = PreloadedCache::preloaded(HashMap::from([
        (key("a"), 1),
        (key("b"), 2),
    ]))
    .unwrap();

    for _ in 0..3 {
        assert_eq!(cache.get(&key("a")).unwrap(), Some(1));
    }
    assert_eq!(cache.get(&key("b")).unwrap(), Some(2));
    assert_eq!(cache.fetch_count(), 1);

    cache.force_refresh().unwrap();
    assert_eq!(cache.fetch_count(), 2);
    assert_eq!(cache.get(&key("a")).unwrap(), Some(1));
    assert_eq!(cache.fetch_count(), 2);
}

#[test]
fn test_bulk_cache_refresh_picks_up_new_data() {
    let version = Arc::new(AtomicUsize::new(1));
    let source_version = version.clone();
    let cache: BulkFetchCache<String, usize> = BulkFetchCache::new(
        CacheConfig::default(),
        move || {
            let v = source_version.load(Ordering::SeqCst);
            Ok(HashMap::from([(key("config"), v)]))
        },
        true,
    )
    .unwrap();

    assert_eq!(cache.get(&key("config")).unwrap(), Some(1));
    version.store(2, Ordering::SeqCst);
    assert_eq!(cache.get(&key("config")).unwrap(), Some(1));

    cache.force_refresh().unwrap();
    assert_eq!(cache.get(&key("config")).unwrap(), Some(2));
    assert!(matches!(
        cache.remove(&key("config")),
        Err(CacheError::UnsupportedOperation(_))
    ));
}

// == Extensions ==

#[test]
fn test_set_and_cached_values() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = sized_cache(CacheConfig::default(), calls.clone());

    cache.set(key("x"), "preset".to_string()).unwrap();
    cache.get(&key("y")).unwrap();

    let mut values = cache.cached_values();
    values.sort();
    assert_eq!(values, vec!["preset".to_string(), "value-of-y".to_string()]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// == Async ==

#[tokio::test]
async fn test_get_async_from_many_tasks() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = Arc::new(sized_cache(CacheConfig::default(), calls.clone()));

    let mut handles = Vec::new();
    for i in 0..16 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.get_async(format!("k{}", i % 4)).await
        }));
    }
    for handle in handles {
        let value = handle.await.unwrap().unwrap();
        assert!(value.unwrap().starts_with("value-of-k"));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(Cache::item_count(cache.as_ref()), 4);
}
