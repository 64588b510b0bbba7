//! Redis cache backend implementation.

use super::CacheBackend;
use crate::config::{SessionConfig, DEFAULT_POOL_SIZE};
use crate::error::{Error, Result};
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use std::time::Duration;

/// Redis backend with connection pooling and async operations.
///
/// The pool is built once and shared by every clone, so a session never
/// races on connection setup.
///
/// # Example
///
/// ```no_run
/// # use cache_gate::backend::{CacheBackend, RedisBackend};
/// # use cache_gate::config::SessionConfig;
/// # use cache_gate::error::Result;
/// # async fn example() -> Result<()> {
/// let config = SessionConfig {
///     database_index: 4,
///     ..Default::default()
/// };
///
/// let backend = RedisBackend::new(&config)?;
/// backend.ping().await?;
/// backend.set("key", "value".to_string(), None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create a pooled backend for the server described by `config`.
    ///
    /// No connection is opened here; the first command (normally the
    /// session's health check) establishes it.
    ///
    /// # Errors
    /// Returns `Err` if the configuration is invalid or the pool cannot be built
    pub fn new(config: &SessionConfig) -> Result<Self> {
        config.validate()?;
        Self::with_pool_size(config.connection_url(), config.pool_size)
    }

    /// Create from a connection URL directly.
    ///
    /// Pool size is determined by:
    /// 1. `REDIS_POOL_SIZE` environment variable (if set)
    /// 2. `DEFAULT_POOL_SIZE` constant
    ///
    /// # Errors
    /// Returns `Err` if connection pool creation fails
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        Self::with_pool_size(url.into(), pool_size)
    }

    fn with_pool_size(url: String, pool_size: usize) -> Result<Self> {
        let mut config = Config::from_url(url);
        config.pool = Some(PoolConfig::new(pool_size));

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create connection pool: {}", e)))?;

        info!("✓ Redis backend initialized (pool size: {})", pool_size);
        Ok(RedisBackend { pool })
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }
}

fn command_error(command: &str, key: &str, error: redis::RedisError) -> Error {
    Error::BackendError(format!("Redis {} failed for key {}: {}", command, key, error))
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;

        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| command_error("GET", key, e))?;

        if value.is_some() {
            debug!("✓ Redis GET {} -> HIT", key);
        } else {
            debug!("✓ Redis GET {} -> MISS", key);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection().await?;

        match ttl {
            Some(d) => {
                // PX takes whole milliseconds and rejects 0.
                let millis = u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1);
                conn.pset_ex::<_, _, ()>(key, value, millis)
                    .await
                    .map_err(|e| command_error("SET", key, e))?;
                debug!("✓ Redis SET {} (TTL: {:?})", key, d);
            }
            None => {
                conn.set::<_, _, ()>(key, value)
                    .await
                    .map_err(|e| command_error("SET", key, e))?;
                debug!("✓ Redis SET {}", key);
            }
        }

        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection().await?;
        let removed: u64 = conn
            .del(keys)
            .await
            .map_err(|e| command_error("DEL", &keys.join(","), e))?;

        debug!("✓ Redis DEL {} keys ({} removed)", keys.len(), removed);
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;

        let keys: Vec<String> = conn
            .keys(pattern)
            .await
            .map_err(|e| command_error("KEYS", pattern, e))?;

        debug!("✓ Redis KEYS {} -> {} keys", pattern, keys.len());
        Ok(keys)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.connection().await?;

        let value: i64 = conn
            .incr(key, delta)
            .await
            .map_err(|e| command_error("INCRBY", key, e))?;

        debug!("✓ Redis INCRBY {} {} -> {}", key, delta, value);
        Ok(value)
    }

    async fn decr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.connection().await?;

        let value: i64 = conn
            .decr(key, delta)
            .await
            .map_err(|e| command_error("DECRBY", key, e))?;

        debug!("✓ Redis DECRBY {} {} -> {}", key, delta, value);
        Ok(value)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;

        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis PING failed: {}", e)))?;

        if reply != "PONG" {
            return Err(Error::BackendError(format!(
                "Unexpected PING reply: {}",
                reply
            )));
        }
        Ok(())
    }
}
