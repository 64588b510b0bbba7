//! In-process backend with TTL expiry, glob key listing and integer counters.

use super::{glob_match, CacheBackend};
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Debug)]
struct StoredValue {
    data: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Thread-safe in-memory store that mirrors the subset of Redis semantics
/// a session relies on.
///
/// Expiry is measured on the tokio clock, so tests can drive it with
/// `tokio::time::pause` and `tokio::time::advance`. Expired entries are
/// dropped lazily when touched.
///
/// # Example
///
/// ```
/// # use cache_gate::backend::{CacheBackend, InMemoryBackend};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> cache_gate::Result<()> {
/// let backend = InMemoryBackend::new();
/// backend.set("greet", "hello".to_string(), None).await?;
/// assert_eq!(backend.get("greet").await?, Some("hello".to_string()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, StoredValue>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.store
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remaining time to live of a key, `None` if it is missing or persistent.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.store
            .get(key)
            .and_then(|entry| entry.expires_at)
            .filter(|at| *at > now)
            .map(|at| at - now)
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.store.clear();
        warn!("⚠ In-memory store cleared");
    }

    fn apply_delta(&self, key: &str, delta: i64) -> Result<i64> {
        let now = Instant::now();
        let mut entry = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| StoredValue {
                data: "0".to_string(),
                expires_at: None,
            });
        if entry.is_expired(now) {
            *entry = StoredValue {
                data: "0".to_string(),
                expires_at: None,
            };
        }

        let current: i64 = entry.data.parse().map_err(|_| {
            Error::BackendError(format!(
                "value is not an integer or out of range for key {}",
                key
            ))
        })?;
        let next = current.checked_add(delta).ok_or_else(|| {
            Error::BackendError(format!("increment or decrement would overflow for key {}", key))
        })?;

        // TTL is kept, as Redis does for INCRBY/DECRBY.
        entry.data = next.to_string();
        Ok(next)
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let value = match self.store.get(key) {
            Some(entry) if entry.is_expired(now) => None,
            Some(entry) => Some(entry.data.clone()),
            None => {
                debug!("✓ In-memory GET {} -> MISS", key);
                return Ok(None);
            }
        };

        match value {
            Some(data) => {
                debug!("✓ In-memory GET {} -> HIT", key);
                Ok(Some(data))
            }
            None => {
                self.store.remove_if(key, |_, stored| stored.is_expired(now));
                debug!("✓ In-memory GET {} -> EXPIRED", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let expires_at = match ttl {
            Some(d) => Some(Instant::now().checked_add(d).ok_or_else(|| {
                Error::BackendError(format!("invalid expire time in SET {}", key))
            })?),
            None => None,
        };
        self.store.insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at,
            },
        );

        if let Some(d) = ttl {
            debug!("✓ In-memory SET {} (TTL: {:?})", key, d);
        } else {
            debug!("✓ In-memory SET {}", key);
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|key| self.store.remove(key))
            .filter(|(_, stored)| !stored.is_expired(now))
            .count() as u64;

        debug!("✓ In-memory DEL {} keys ({} removed)", keys.len(), removed);
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let mut matched: Vec<String> = self
            .store
            .iter()
            .filter(|entry| !entry.value().is_expired(now) && glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        matched.sort();

        debug!("✓ In-memory KEYS {} -> {} keys", pattern, matched.len());
        Ok(matched)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let value = self.apply_delta(key, delta)?;
        debug!("✓ In-memory INCRBY {} {} -> {}", key, delta, value);
        Ok(value)
    }

    async fn decr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let negated = delta.checked_neg().ok_or_else(|| {
            Error::BackendError(format!("decrement would overflow for key {}", key))
        })?;
        let value = self.apply_delta(key, negated)?;
        debug!("✓ In-memory DECRBY {} {} -> {}", key, delta, value);
        Ok(value)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
