//! Cache Module
//!
//! Provides the generic cache engine with pluggable expiration, reap and
//! null-value policies.

mod engine;
mod entry;
mod eviction;
mod events;
mod policy;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use engine::{CacheEngine, WriteScope};
pub use entry::CachedItem;
pub use events::{RemovalReason, SubscriptionId};
pub use policy::{CacheReapPolicy, ExpirationPolicy, NullValuePolicy};
pub use stats::CacheStats;
