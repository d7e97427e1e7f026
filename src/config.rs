//! Configuration Module
//!
//! Handles loading, validating and adjusting cache configuration.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheReapPolicy, ExpirationPolicy, NullValuePolicy};
use crate::error::{CacheError, Result};

/// Default expiration window in seconds
pub const DEFAULT_EXPIRATION_SECS: u64 = 300;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on the summed size of all cached items
    pub max_capacity: u64,
    /// Rule deciding when items become stale
    pub expiration_policy: ExpirationPolicy,
    /// Age after which an item is stale, serialized as milliseconds
    #[serde(with = "duration_ms")]
    pub expiration_duration: Duration,
    /// Victim ordering used when space is needed
    pub reap_policy: CacheReapPolicy,
    /// Treatment of fetches that yield no value
    pub null_value_policy: NullValuePolicy,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_CAPACITY` - Maximum summed item size (default: unbounded)
    /// - `CACHE_EXPIRATION_POLICY` - `none`, `since_fetched_time` or `since_last_accessed_time`
    /// - `CACHE_EXPIRATION_SECS` - Expiration window in seconds (default: 300)
    /// - `CACHE_REAP_POLICY` - Reap policy name (default: `least_used`)
    /// - `CACHE_NULL_VALUE_POLICY` - Null value policy name (default: `cache_normally`)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_capacity: env::var("CACHE_MAX_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_capacity),
            expiration_policy: env::var("CACHE_EXPIRATION_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.expiration_policy),
            expiration_duration: env::var("CACHE_EXPIRATION_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.expiration_duration),
            reap_policy: env::var("CACHE_REAP_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reap_policy),
            null_value_policy: env::var("CACHE_NULL_VALUE_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.null_value_policy),
        }
    }

    /// Sets the maximum capacity.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Sets the expiration policy together with its window.
    pub fn with_expiration(mut self, policy: ExpirationPolicy, duration: Duration) -> Self {
        self.expiration_policy = policy;
        self.expiration_duration = duration;
        self
    }

    /// Sets the reap policy.
    pub fn with_reap_policy(mut self, reap_policy: CacheReapPolicy) -> Self {
        self.reap_policy = reap_policy;
        self
    }

    /// Sets the null value policy.
    pub fn with_null_value_policy(mut self, null_value_policy: NullValuePolicy) -> Self {
        self.null_value_policy = null_value_policy;
        self
    }

    // == Validate ==
    /// Checks the configuration for values the engine cannot honour.
    ///
    /// # Errors
    /// - `InvalidConfig` if `max_capacity` is zero
    /// - `InvalidConfig` if an expiration policy is set with a zero window
    pub fn validate(&self) -> Result<()> {
        if self.max_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "max_capacity must be greater than zero".to_string(),
            ));
        }
        if self.expiration_policy != ExpirationPolicy::None && self.expiration_duration.is_zero() {
            return Err(CacheError::InvalidConfig(format!(
                "expiration policy {:?} requires a non-zero expiration_duration",
                self.expiration_policy
            )));
        }
        Ok(())
    }

    /// True when items can age out on their own.
    pub fn expiration_enabled(&self) -> bool {
        self.expiration_policy != ExpirationPolicy::None
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: u64::MAX,
            expiration_policy: ExpirationPolicy::None,
            expiration_duration: Duration::from_secs(DEFAULT_EXPIRATION_SECS),
            reap_policy: CacheReapPolicy::LeastUsed,
            null_value_policy: NullValuePolicy::CacheNormally,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
