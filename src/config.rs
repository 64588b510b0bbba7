//! Session configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default backend connection pool size.
/// Formula: (CPU cores × 2) + 1, rounded for 8-core systems.
pub const DEFAULT_POOL_SIZE: usize = 16;

/// Time budget for each class of backend call.
///
/// Expressed in whole seconds so the struct maps directly onto config files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationTimeouts {
    /// Initial PING performed when the session is created.
    pub health_check_secs: u64,
    /// Single-key reads and deletes.
    pub read_secs: u64,
    /// Writes, counters, key listing and multi-key deletes.
    pub write_secs: u64,
    /// List-then-delete by pattern.
    pub pattern_delete_secs: u64,
}

impl OperationTimeouts {
    pub fn health_check(&self) -> Duration {
        Duration::from_secs(self.health_check_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    pub fn pattern_delete(&self) -> Duration {
        Duration::from_secs(self.pattern_delete_secs)
    }
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        OperationTimeouts {
            health_check_secs: 2,
            read_secs: 5,
            write_secs: 10,
            pattern_delete_secs: 15,
        }
    }
}

/// Immutable settings for a [`CacheSession`](crate::CacheSession).
///
/// # Example
///
/// ```
/// use cache_gate::config::SessionConfig;
///
/// let config = SessionConfig {
///     database_index: 4,
///     key_prefix: "test:".to_string(),
///     debug_logging: true,
///     ..Default::default()
/// };
/// assert_eq!(config.connection_url(), "redis://127.0.0.1:6379/4");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Logical database, 0 to 15 on a stock Redis server.
    pub database_index: i64,
    /// Prepended verbatim to every logical key.
    pub key_prefix: String,
    /// Expiration for candidates that declare none. 0 disables it.
    pub default_expiration_minutes: u64,
    /// Emit per-operation diagnostics through `log`.
    pub debug_logging: bool,
    pub pool_size: usize,
    pub timeouts: OperationTimeouts,
}

impl SessionConfig {
    /// Connection URL in the `redis://[:password@]host:port/db` form.
    pub fn connection_url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.database_index
            ),
            None => format!(
                "redis://{}:{}/{}",
                self.host, self.port, self.database_index
            ),
        }
    }

    /// Session-wide fallback expiration, if configured.
    pub fn default_expiration(&self) -> Option<Duration> {
        match self.default_expiration_minutes {
            0 => None,
            minutes => minutes.checked_mul(60).map(Duration::from_secs),
        }
    }

    /// Check the settings before a connection is attempted.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` for an empty host, port 0, a negative
    /// database index, a zero pool size or a default expiration too large
    /// to express in seconds.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::ConfigError("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::ConfigError("port must not be 0".to_string()));
        }
        if self.database_index < 0 {
            return Err(Error::ConfigError(format!(
                "invalid database index {}",
                self.database_index
            )));
        }
        if self.pool_size == 0 {
            return Err(Error::ConfigError("pool size must not be 0".to_string()));
        }
        if self.default_expiration_minutes.checked_mul(60).is_none() {
            return Err(Error::ConfigError(format!(
                "default expiration of {} minutes is out of range",
                self.default_expiration_minutes
            )));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            database_index: 0,
            key_prefix: String::new(),
            default_expiration_minutes: 0,
            debug_logging: false,
            pool_size: DEFAULT_POOL_SIZE,
            timeouts: OperationTimeouts::default(),
        }
    }
}
