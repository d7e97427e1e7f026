//! Cache Policy Module
//!
//! Policy enums read by the engine on every expiry, eviction and null-value decision.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

// == Expiration Policy ==
/// Rule deciding when an item's age makes it stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationPolicy {
    /// Items only expire when invalidated
    #[default]
    None,
    /// Age is measured from the moment the item was fetched
    SinceFetchedTime,
    /// Age is measured from the last successful access
    SinceLastAccessedTime,
}

// == Reap Policy ==
/// Ordering used to choose victims when space is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheReapPolicy {
    /// Only expired items may be reaped
    None,
    /// Single unordered pass, expired items first
    Asap,
    /// Fewest accesses first, larger items first on ties
    #[default]
    LeastUsed,
    /// Earliest fetched first
    Oldest,
    /// Longest time since last access first
    LongestIdle,
    /// Largest size first
    Largest,
    /// Smallest size first
    Smallest,
}

// == Null Value Policy ==
/// How a fetch that yields no value is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullValuePolicy {
    /// Store the absent value like any other
    #[default]
    CacheNormally,
    /// Fail the lookup
    Throw,
    /// Return the absent value but force a refetch next time
    ReturnButDontCache,
}

/// Lower-cases and strips separators so `since-fetched-time` and `SinceFetchedTime` agree.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for ExpirationPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "none" => Ok(Self::None),
            "sincefetchedtime" => Ok(Self::SinceFetchedTime),
            "sincelastaccessedtime" => Ok(Self::SinceLastAccessedTime),
            _ => Err(CacheError::InvalidConfig(format!(
                "unknown expiration policy '{}'",
                s
            ))),
        }
    }
}

impl FromStr for CacheReapPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "none" => Ok(Self::None),
            "asap" => Ok(Self::Asap),
            "leastused" => Ok(Self::LeastUsed),
            "oldest" => Ok(Self::Oldest),
            "longestidle" => Ok(Self::LongestIdle),
            "largest" => Ok(Self::Largest),
            "smallest" => Ok(Self::Smallest),
            _ => Err(CacheError::InvalidConfig(format!(
                "unknown reap policy '{}'",
                s
            ))),
        }
    }
}

impl FromStr for NullValuePolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "cachenormally" => Ok(Self::CacheNormally),
            "throw" => Ok(Self::Throw),
            "returnbutdontcache" => Ok(Self::ReturnButDontCache),
            _ => Err(CacheError::InvalidConfig(format!(
                "unknown null value policy '{}'",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_mixed_spellings() {
        assert_eq!(
            "since-fetched-time".parse::<ExpirationPolicy>().unwrap(),
            ExpirationPolicy::SinceFetchedTime
        );
        assert_eq!(
            "LongestIdle".parse::<CacheReapPolicy>().unwrap(),
            CacheReapPolicy::LongestIdle
        );
        assert_eq!(
            "return_but_dont_cache".parse::<NullValuePolicy>().unwrap(),
            NullValuePolicy::ReturnButDontCache
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let result = "sometimes".parse::<CacheReapPolicy>();
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&CacheReapPolicy::LeastUsed).unwrap();
        assert_eq!(json, "\"least_used\"");

        let policy: ExpirationPolicy = serde_json::from_str("\"since_last_accessed_time\"").unwrap();
        assert_eq!(policy, ExpirationPolicy::SinceLastAccessedTime);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ExpirationPolicy::default(), ExpirationPolicy::None);
        assert_eq!(CacheReapPolicy::default(), CacheReapPolicy::LeastUsed);
        assert_eq!(NullValuePolicy::default(), NullValuePolicy::CacheNormally);
    }
}
