//! Metrics hooks for session operations.
//!
//! Implement [`CacheMetrics`] to feed your monitoring system:
//!
//! ```ignore
//! use cache_gate::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _key: &str, _duration: Duration) {
//!         // counter!("cache_hits").inc();
//!     }
//!     // ... implement other methods
//! }
//!
//! // let session = SessionBuilder::new(backend)
//! //     .metrics(Arc::new(PrometheusMetrics))
//! //     .build()
//! //     .await?;
//! ```
//!
//! Every hook receives the physical key. Sessions default to [`NoOpMetrics`].
//! Debug diagnostics are a separate concern, controlled by
//! `SessionConfig::debug_logging`.

use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// A read found a value.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// A read found nothing.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// A value or counter was written.
    fn record_set(&self, key: &str, duration: Duration) {
        debug!("Cache SET: {} took {:?}", key, duration);
    }

    /// Keys were removed. `removed` is the count the backend reported.
    fn record_delete(&self, key: &str, removed: u64, duration: Duration) {
        debug!("Cache DELETE: {} removed {} took {:?}", key, removed, duration);
    }

    /// An operation failed.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_delete(&self, _key: &str, _removed: u64, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}
