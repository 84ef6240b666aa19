//! Cache client interface used by higher-level services (token store, etc.).
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command).
///
/// Note:
/// - Kept independent from `AppError` so callers can decide how to fail.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
}

/// A small, string-based cache interface.
///
/// The token store needs:
/// - `SET NX EX` for first-writer-wins inserts with expiry,
/// - `GET`/`DEL` for lookups and logout,
/// - a set per subject (`SADD`/`SMEMBERS`/`SREM`) for logout-all.
///
/// Implementations must be cheap to clone (typically `Arc<...>` inside)
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    // Returns the cache backend name (for logging/metrics).
    fn backend_name(&self) -> &'static str;

    // Get UTF-8 string value.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    // Set value if the key does not exist, with TTL.
    //
    // Returns:
    // - `Ok(true)`  if the key was set (not seen before)
    // - `Ok(false)` if the key already exists
    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool>;

    // Delete keys. Returns number of deleted keys.
    async fn del(&self, keys: &[String]) -> CacheResult<u64>;

    // Add a member to a set and make sure the set lives at least `ttl`.
    async fn set_add_with_min_ttl(&self, key: &str, member: &str, ttl: Duration)
    -> CacheResult<()>;

    // All members of a set (empty when the key is missing).
    async fn set_members(&self, key: &str) -> CacheResult<Vec<String>>;

    // Remove a member from a set.
    async fn set_remove(&self, key: &str, member: &str) -> CacheResult<()>;
}

/// Clamp a TTL to the whole seconds Valkey expects (at least 1).
pub fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
