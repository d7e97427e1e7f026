//! API Module
//!
//! The public cache contract consumed by the rest of an application.
//!
//! # Surface
//! - [`Cache`] - Lookup, loading, invalidation, removal, configuration and
//!   notifications, implemented by every [`CacheEngine`](crate::cache::CacheEngine)
//! - [`CacheExt`] - Index-style `set` and value dumping on top of any `Cache`

pub mod contract;
pub mod extensions;

pub use contract::Cache;
pub use extensions::CacheExt;
