//! Key-value store backends.
//!
//! A session talks to its store exclusively through [`CacheBackend`]. Keys
//! reaching a backend are already physical (prefixed); backends never apply
//! prefixes or registration checks of their own.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

#[cfg(feature = "inmemory")]
mod inmemory;
mod pattern;
#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryBackend;
pub use pattern::glob_match;
#[cfg(feature = "redis")]
pub use redis::RedisBackend;

/// Commands a remote key-value store must support.
///
/// Implementations must be safe for concurrent use once constructed and cheap
/// to clone (clones share the same connection or pool).
pub trait CacheBackend: Send + Sync + Clone + 'static {
    /// Fetch a value. `Ok(None)` when the key does not exist.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Store a value, replacing any previous one. `None` TTL means no expiration.
    fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete keys, returning how many actually existed.
    fn delete(&self, keys: &[String]) -> impl Future<Output = Result<u64>> + Send;

    /// List keys matching a glob-style pattern.
    fn keys(&self, pattern: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Add `delta` to an integer value (missing keys count as 0) and return the result.
    fn incr_by(&self, key: &str, delta: i64) -> impl Future<Output = Result<i64>> + Send;

    /// Subtract `delta` from an integer value and return the result.
    fn decr_by(&self, key: &str, delta: i64) -> impl Future<Output = Result<i64>> + Send;

    fn incr(&self, key: &str) -> impl Future<Output = Result<i64>> + Send {
        self.incr_by(key, 1)
    }

    fn decr(&self, key: &str) -> impl Future<Output = Result<i64>> + Send {
        self.decr_by(key, 1)
    }

    /// Liveness check.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}
