//! Read-through cache for derived aggregates and its invalidation path.
//!
//! The cache is advisory: every failure in here is logged and swallowed so
//! that the authoritative path never depends on it.
//!
//! - [`CacheStore`] is the key/value seam ([`MemoryCache`] in-process).
//! - [`CacheCoordinator`] reads through the cache, evicts on mutation and
//!   publishes an [`crate::domain::InvalidationEvent`] with bounded retry.
//! - [`InvalidationListener`] consumes those events and purges every
//!   namespace derived from the event.

pub mod coordinator;
pub mod listener;
pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

pub use coordinator::{CacheCoordinator, PublishOutcome, publish_with_retry};
pub use listener::InvalidationListener;
pub use memory::MemoryCache;

/// Failure of the cache backend. Never surfaced to API callers.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    /// A value could not be encoded or decoded.
    #[error("cache value could not be (de)serialized: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// String key/value store with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Returns the live value under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the backend fails.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the backend fails.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the backend fails.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Removes every key starting with `prefix` and returns how many went.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the backend fails.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}
