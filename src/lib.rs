//! Cache Engine - A generic capacity-bounded cache
//!
//! Provides keyed caching with pluggable expiration, reap and null-value
//! policies, single-key and bulk fetch strategies, and fetch/removal
//! notifications.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;

pub use api::{Cache, CacheExt};
pub use cache::{
    CacheEngine, CacheReapPolicy, CacheStats, CachedItem, ExpirationPolicy, NullValuePolicy,
};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use fetch::{ActionCache, BulkFetchCache, PreloadedCache};
