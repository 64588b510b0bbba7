//! Builder pattern for cache session construction.

use crate::backend::CacheBackend;
use crate::candidate::CacheCandidate;
use crate::config::{OperationTimeouts, SessionConfig};
use crate::error::Result;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::registry::CandidateRegistry;
use crate::CacheSession;
use std::sync::Arc;

/// Fluent builder for a [`CacheSession`].
///
/// Candidates registered here are in place before the session serves its
/// first call, so no write can race a late registration.
///
/// # Example
///
/// ```ignore
/// let session = SessionBuilder::new(InMemoryBackend::new())
///     .config(config)
///     .key_prefix("test:")
///     .debug_logging(true)
///     .candidate::<Employment>("employment records")
///     .metrics(Arc::new(PrometheusMetrics))
///     .build()
///     .await?;
/// ```
pub struct SessionBuilder<B: CacheBackend> {
    backend: B,
    config: SessionConfig,
    registry: CandidateRegistry,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend> SessionBuilder<B> {
    /// Create a new builder with default settings.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: SessionConfig::default(),
            registry: CandidateRegistry::new(),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the key prefix.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Enable or disable per-operation diagnostics.
    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.config.debug_logging = enabled;
        self
    }

    pub fn timeouts(mut self, timeouts: OperationTimeouts) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    /// Set custom metrics handler.
    pub fn metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Register `T` before the session is built.
    pub fn candidate<T: CacheCandidate>(self, description: impl Into<String>) -> Self {
        self.registry.register::<T>(description);
        self
    }

    /// Validate the configuration, health-check the backend and build the session.
    ///
    /// # Errors
    ///
    /// - `Error::ConfigError`: invalid configuration
    /// - `Error::BackendError`: the backend rejected the health check
    /// - `Error::Timeout`: the health check exceeded its budget
    pub async fn build(self) -> Result<CacheSession<B>> {
        CacheSession::establish(self.backend, self.config, self.registry, self.metrics).await
    }
}
