//! Cache Engine demo
//!
//! Resolves the keys given on the command line through a size-bounded
//! `ActionCache` and prints the resulting statistics as JSON.
//!
//! ```text
//! CACHE_MAX_CAPACITY=16 CACHE_REAP_POLICY=oldest cache_engine alpha beta alpha gamma
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_engine::{ActionCache, CacheConfig};

/// Capacity units for a value: its byte length, saturating at `u32::MAX`.
fn value_size(value: &str) -> u32 {
    u32::try_from(value.len()).unwrap_or(u32::MAX)
}

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create an action cache sized by value length
/// 4. Resolve every command-line key through `get_async`
/// 5. Print statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: max_capacity={}, expiration={:?}/{:?}, reap={:?}, null={:?}",
        config.max_capacity,
        config.expiration_policy,
        config.expiration_duration,
        config.reap_policy,
        config.null_value_policy
    );

    let cache = ActionCache::with_size_estimator(
        config,
        |key: &String| {
            debug!(%key, "computing value");
            Some(key.to_uppercase())
        },
        |value: &String| value_size(value),
    )
    .context("invalid cache configuration")?;
    let cache = Arc::new(cache);

    cache.on_item_removed(|key, item, reason| {
        info!(%key, ?reason, size = item.size(), accesses = item.accessed_count(), "item left the cache");
    });

    for key in std::env::args().skip(1) {
        let value = cache
            .clone()
            .get_async(key.clone())
            .await
            .with_context(|| format!("lookup of '{}' failed", key))?;
        info!(%key, ?value, "resolved");
    }

    println!("{}", serde_json::to_string_pretty(&cache.stats())?);
    Ok(())
}
