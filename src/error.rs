//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for every cache operation.
#[derive(Error, Debug)]
pub enum CacheError {
    /// An item does not fit, either outright or after the reap pass
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A fetch produced no value while the null value policy is `Throw`
    #[error("Null value prohibited: {0}")]
    NullValueProhibited(String),

    /// The operation is not available on this kind of cache
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Key absent from a bulk source after a full reload
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The fetch function reported a failure
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
