//! Cache session - main entry point for typed cache operations.

use crate::backend::CacheBackend;
use crate::builder::SessionBuilder;
use crate::candidate::CacheCandidate;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::observability::CacheMetrics;
use crate::registry::CandidateRegistry;
use crate::serialization;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Typed front-end over a key-value backend.
///
/// A session owns one backend handle, one [`CandidateRegistry`] and an
/// immutable [`SessionConfig`]. Every key handed to the backend is the
/// configured `key_prefix` followed by the logical key; no separator is
/// inserted. Every backend call is bounded by the matching entry of
/// [`OperationTimeouts`](crate::config::OperationTimeouts) and is never retried.
///
/// Typed writes (`set*`) are refused unless the record's master key is
/// registered. Reads never consult the registry. Raw string and counter
/// operations bypass it entirely.
///
/// Clones share the backend, the registry and the configuration.
///
/// # Example
///
/// ```
/// use cache_gate::{backend::InMemoryBackend, config::SessionConfig, CacheCandidate, CacheSession};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Profile {
///     id: u32,
///     name: String,
/// }
///
/// impl CacheCandidate for Profile {
///     fn cache_key(&self, _tenant: &str, user: &str) -> String {
///         format!("PROFILE:{}", user)
///     }
///
///     fn master_key() -> &'static str {
///         "PROFILE:"
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> cache_gate::Result<()> {
/// let config = SessionConfig {
///     key_prefix: "app:".to_string(),
///     ..Default::default()
/// };
/// let session = CacheSession::new(InMemoryBackend::new(), config).await?;
/// session.register_candidate::<Profile>("user profiles");
///
/// let profile = Profile { id: 1, name: "AAA".into() };
/// session.set(&profile, "acme", "u1").await?;
///
/// let cached: Profile = session.get_scan("acme", "u1", &profile).await?;
/// assert_eq!(cached, profile);
/// # Ok(())
/// # }
/// ```
pub struct CacheSession<B: CacheBackend> {
    backend: B,
    registry: CandidateRegistry,
    config: Arc<SessionConfig>,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend> Clone for CacheSession<B> {
    fn clone(&self) -> Self {
        CacheSession {
            backend: self.backend.clone(),
            registry: self.registry.clone(),
            config: Arc::clone(&self.config),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Run a backend call under a time budget.
async fn bounded<T>(
    operation: &str,
    key: &str,
    budget: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "{} on '{}' exceeded {:?}",
            operation, key, budget
        ))),
    }
}

impl<B: CacheBackend> CacheSession<B> {
    /// Create a session and health-check the backend.
    ///
    /// Shorthand for `SessionBuilder::new(backend).config(config).build()`.
    ///
    /// # Errors
    ///
    /// - `Error::ConfigError`: invalid configuration
    /// - `Error::BackendError` / `Error::Timeout`: the backend did not answer PING
    ///   within `timeouts.health_check_secs`
    pub async fn new(backend: B, config: SessionConfig) -> Result<Self> {
        SessionBuilder::new(backend).config(config).build().await
    }

    pub(crate) async fn establish(
        backend: B,
        config: SessionConfig,
        registry: CandidateRegistry,
        metrics: Arc<dyn CacheMetrics>,
    ) -> Result<Self> {
        config.validate()?;

        let budget = config.timeouts.health_check();
        if let Err(e) = bounded("ping", "", budget, backend.ping()).await {
            warn!("✗ Cache backend health check failed: {}", e);
            return Err(e);
        }

        info!(
            "✓ Cache session ready (prefix: '{}', database: {}, candidates: {})",
            config.key_prefix,
            config.database_index,
            registry.len()
        );

        Ok(CacheSession {
            backend,
            registry,
            config: Arc::new(config),
            metrics,
        })
    }

    // ------------------------------------------------------------------
    // Candidate registry
    // ------------------------------------------------------------------

    /// Allow records of type `T` to be written. Re-registering replaces the description.
    pub fn register_candidate<T: CacheCandidate>(&self, description: impl Into<String>) {
        self.registry.register::<T>(description);
    }

    /// Every registered master key with its description.
    pub fn list_candidates(&self) -> BTreeMap<String, String> {
        self.registry.list()
    }

    pub fn is_registered(&self, master_key: &str) -> bool {
        self.registry.is_registered(master_key)
    }

    pub fn registry(&self) -> &CandidateRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Typed writes
    // ------------------------------------------------------------------

    /// Write `record` using its default expiration.
    ///
    /// Falls back to the session's `default_expiration_minutes` when the type
    /// declares none; with neither, the key does not expire.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument`: `record` is absent (e.g. `None`)
    /// - `Error::Unregistered`: `T::master_key()` was never registered
    /// - `Error::SerializationError`: the record cannot be encoded
    /// - `Error::BackendError` / `Error::Timeout`: the SET failed
    pub async fn set<T: CacheCandidate>(
        &self,
        record: &T,
        parent1: &str,
        parent2: &str,
    ) -> Result<()> {
        let expiration = self.expiration_for::<T>();
        self.write_record("set", record, expiration, parent1, parent2)
            .await
    }

    /// Write `record` with an explicit expiration. `Duration::ZERO` means no expiration.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub async fn set_with_expiration<T: CacheCandidate>(
        &self,
        record: &T,
        expiration: Duration,
        parent1: &str,
        parent2: &str,
    ) -> Result<()> {
        self.write_record("set_with_expiration", record, Some(expiration), parent1, parent2)
            .await
    }

    /// Write a whole collection as one envelope under the exemplar's key.
    ///
    /// `exemplar` supplies the master key and the key derivation; it is not written.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument`: `values` is `None`
    /// - `Error::Unregistered`: the exemplar's master key was never registered
    /// - `Error::SerializationError` / `Error::BackendError` / `Error::Timeout`
    pub async fn set_slice<T: CacheCandidate>(
        &self,
        values: Option<&[T]>,
        parent1: &str,
        parent2: &str,
        exemplar: &T,
    ) -> Result<()> {
        let expiration = self.expiration_for::<T>();
        self.write_slice("set_slice", values, expiration, parent1, parent2, exemplar)
            .await
    }

    /// [`set_slice`](Self::set_slice) with an explicit expiration.
    pub async fn set_slice_with_expiration<T: CacheCandidate>(
        &self,
        values: Option<&[T]>,
        parent1: &str,
        parent2: &str,
        expiration: Duration,
        exemplar: &T,
    ) -> Result<()> {
        self.write_slice(
            "set_slice_with_expiration",
            values,
            Some(expiration),
            parent1,
            parent2,
            exemplar,
        )
        .await
    }

    async fn write_record<T: CacheCandidate>(
        &self,
        operation: &str,
        record: &T,
        expiration: Option<Duration>,
        parent1: &str,
        parent2: &str,
    ) -> Result<()> {
        if record.is_absent() {
            return Err(self.report(
                operation,
                T::master_key(),
                Error::InvalidArgument("nil value".to_string()),
            ));
        }
        let key = self.physical_key(&record.cache_key(parent1, parent2));
        self.ensure_registered::<T>(operation, &key)?;

        let envelope =
            serialization::encode(record).map_err(|e| self.report(operation, &key, e))?;
        self.store(operation, &key, envelope, expiration).await
    }

    async fn write_slice<T: CacheCandidate>(
        &self,
        operation: &str,
        values: Option<&[T]>,
        expiration: Option<Duration>,
        parent1: &str,
        parent2: &str,
        exemplar: &T,
    ) -> Result<()> {
        let values = match values {
            Some(values) => values,
            None => {
                return Err(self.report(
                    operation,
                    T::master_key(),
                    Error::InvalidArgument("nil value".to_string()),
                ))
            }
        };
        let key = self.physical_key(&exemplar.cache_key(parent1, parent2));
        self.ensure_registered::<T>(operation, &key)?;

        let envelope =
            serialization::encode(values).map_err(|e| self.report(operation, &key, e))?;
        self.store(operation, &key, envelope, expiration).await
    }

    fn ensure_registered<T: CacheCandidate>(&self, operation: &str, key: &str) -> Result<()> {
        if self.registry.is_registered(T::master_key()) {
            return Ok(());
        }
        Err(self.report(
            operation,
            key,
            Error::Unregistered(T::master_key().to_string()),
        ))
    }

    fn expiration_for<T: CacheCandidate>(&self) -> Option<Duration> {
        T::default_expiration().or_else(|| self.config.default_expiration())
    }

    // ------------------------------------------------------------------
    // Raw strings and counters (never gated)
    // ------------------------------------------------------------------

    /// Store a raw string under `key_prefix + key`.
    pub async fn set_str(&self, value: &str, key: &str, expiration: Duration) -> Result<()> {
        let key = self.physical_key(key);
        self.store("set_str", &key, value.to_string(), Some(expiration))
            .await
    }

    /// Store an integer counter under `key_prefix + key`.
    pub async fn counter_set(&self, value: i64, key: &str, expiration: Duration) -> Result<()> {
        let key = self.physical_key(key);
        self.store("counter_set", &key, value.to_string(), Some(expiration))
            .await
    }

    /// Read a counter.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound`: the key does not exist
    /// - `Error::DeserializationError`: the stored value is not an integer
    pub async fn counter_get(&self, key: &str) -> Result<i64> {
        let raw = self.get(key).await?;
        raw.trim().parse::<i64>().map_err(|e| {
            self.report(
                "counter_get",
                &self.physical_key(key),
                Error::DeserializationError(format!("'{}' is not an integer: {}", raw, e)),
            )
        })
    }

    /// Increment a counter by one, returning the new value.
    pub async fn incr(&self, key: &str) -> Result<i64> {
        let key = self.physical_key(key);
        self.adjust_counter("incr", &key, self.backend.incr(&key))
            .await
    }

    pub async fn incr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let key = self.physical_key(key);
        self.adjust_counter("incr_by", &key, self.backend.incr_by(&key, amount))
            .await
    }

    /// Decrement a counter by one, returning the new value.
    pub async fn decr(&self, key: &str) -> Result<i64> {
        let key = self.physical_key(key);
        self.adjust_counter("decr", &key, self.backend.decr(&key))
            .await
    }

    pub async fn decr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let key = self.physical_key(key);
        self.adjust_counter("decr_by", &key, self.backend.decr_by(&key, amount))
            .await
    }

    async fn adjust_counter(
        &self,
        operation: &str,
        key: &str,
        call: impl Future<Output = Result<i64>>,
    ) -> Result<i64> {
        let timer = Instant::now();
        match bounded(operation, key, self.config.timeouts.write(), call).await {
            Ok(value) => {
                self.metrics.record_set(key, timer.elapsed());
                Ok(value)
            }
            Err(e) => Err(self.report(operation, key, e)),
        }
    }

    async fn store(
        &self,
        operation: &str,
        key: &str,
        envelope: String,
        expiration: Option<Duration>,
    ) -> Result<()> {
        let ttl = expiration.filter(|d| !d.is_zero());
        let timer = Instant::now();

        match bounded(
            operation,
            key,
            self.config.timeouts.write(),
            self.backend.set(key, envelope, ttl),
        )
        .await
        {
            Ok(()) => {
                self.metrics.record_set(key, timer.elapsed());
                Ok(())
            }
            Err(e) => Err(self.report(operation, key, e)),
        }
    }

    // ------------------------------------------------------------------
    // Reads (never gated)
    // ------------------------------------------------------------------

    /// Raw stored string for `key_prefix + key`.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound`: no value (missing or expired)
    /// - `Error::BackendError` / `Error::Timeout`: the GET failed
    pub async fn get(&self, key: &str) -> Result<String> {
        let key = self.physical_key(key);
        let timer = Instant::now();

        match bounded("get", &key, self.config.timeouts.read(), self.backend.get(&key)).await {
            Ok(Some(value)) => {
                self.metrics.record_hit(&key, timer.elapsed());
                Ok(value)
            }
            Ok(None) => {
                self.metrics.record_miss(&key, timer.elapsed());
                self.diagnose("get", format_args!("'{}' not found", key));
                Err(Error::NotFound(key))
            }
            Err(e) => Err(self.report("get", &key, e)),
        }
    }

    /// Fetch `key_prefix + key` and decode it into `D`.
    ///
    /// # Errors
    ///
    /// Errors from [`get`](Self::get), or `Error::DeserializationError`.
    pub async fn get_scan_by_key<D: DeserializeOwned>(&self, key: &str) -> Result<D> {
        let envelope = self.get(key).await?;
        serialization::decode(&envelope)
            .map_err(|e| self.report("get_scan_by_key", &self.physical_key(key), e))
    }

    /// Fetch the value stored under `exemplar.cache_key(parent1, parent2)` and decode it.
    ///
    /// `D` is usually `T` for single records or `Vec<T>` for slices.
    pub async fn get_scan<T: CacheCandidate, D: DeserializeOwned>(
        &self,
        parent1: &str,
        parent2: &str,
        exemplar: &T,
    ) -> Result<D> {
        self.get_scan_by_key(&exemplar.cache_key(parent1, parent2))
            .await
    }

    /// Typed read of a collection written with [`set_slice`](Self::set_slice).
    pub async fn get_slice<T: CacheCandidate>(
        &self,
        parent1: &str,
        parent2: &str,
        exemplar: &T,
    ) -> Result<Vec<T>> {
        self.get_scan(parent1, parent2, exemplar).await
    }

    // ------------------------------------------------------------------
    // Enumeration and deletion
    // ------------------------------------------------------------------

    /// Physical keys matching `key_prefix + pattern`. Empty when nothing matches.
    pub async fn get_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = self.physical_key(pattern);

        match bounded(
            "get_keys",
            &pattern,
            self.config.timeouts.write(),
            self.backend.keys(&pattern),
        )
        .await
        {
            Ok(keys) => {
                self.diagnose("get_keys", format_args!("'{}' result: {:?}", pattern, keys));
                Ok(keys)
            }
            Err(e) => Err(self.report("get_keys", &pattern, e)),
        }
    }

    /// Delete `key_prefix + key`, returning 1 if it existed.
    pub async fn del_key(&self, key: &str) -> Result<u64> {
        let key = self.physical_key(key);
        self.remove("del_key", &key, vec![key.clone()], self.config.timeouts.read())
            .await
    }

    /// Delete several logical keys, each prefixed like [`del_key`](Self::del_key).
    ///
    /// Keys returned by [`get_keys`](Self::get_keys) are physical; pass them
    /// through [`logical_key`](Self::logical_key) first, or use
    /// [`del_by_pattern`](Self::del_by_pattern).
    pub async fn del_keys<S: AsRef<str>>(&self, keys: &[S]) -> Result<u64> {
        let keys: Vec<String> = keys
            .iter()
            .map(|key| self.physical_key(key.as_ref()))
            .collect();
        let label = keys.join(",");
        self.remove("del_keys", &label, keys, self.config.timeouts.write())
            .await
    }

    /// List `key_prefix + pattern`, then delete what was listed.
    ///
    /// Not atomic: keys created after the listing survive, and keys removed
    /// by someone else in between lower the returned count.
    pub async fn del_by_pattern(&self, pattern: &str) -> Result<u64> {
        let pattern = self.physical_key(pattern);
        let timer = Instant::now();

        match bounded(
            "del_by_pattern",
            &pattern,
            self.config.timeouts.pattern_delete(),
            self.list_and_delete(&pattern),
        )
        .await
        {
            Ok(removed) => {
                self.metrics
                    .record_delete(&pattern, removed, timer.elapsed());
                Ok(removed)
            }
            Err(e) => Err(self.report("del_by_pattern", &pattern, e)),
        }
    }

    async fn list_and_delete(&self, pattern: &str) -> Result<u64> {
        let keys = self.backend.keys(pattern).await?;
        self.diagnose(
            "del_by_pattern",
            format_args!("'{}' result: {:?}", pattern, keys),
        );
        if keys.is_empty() {
            return Ok(0);
        }
        self.backend.delete(&keys).await
    }

    async fn remove(
        &self,
        operation: &str,
        label: &str,
        keys: Vec<String>,
        budget: Duration,
    ) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let timer = Instant::now();

        match bounded(operation, label, budget, self.backend.delete(&keys)).await {
            Ok(removed) => {
                self.metrics.record_delete(label, removed, timer.elapsed());
                Ok(removed)
            }
            Err(e) => Err(self.report(operation, label, e)),
        }
    }

    // ------------------------------------------------------------------
    // Keys, accessors and diagnostics
    // ------------------------------------------------------------------

    /// `key_prefix + logical`.
    pub fn physical_key(&self, logical: &str) -> String {
        format!("{}{}", self.config.key_prefix, logical)
    }

    /// Strip the configured prefix; keys without it are returned unchanged.
    pub fn logical_key<'a>(&self, physical: &'a str) -> &'a str {
        physical
            .strip_prefix(self.config.key_prefix.as_str())
            .unwrap_or(physical)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Underlying backend, for commands outside this layer.
    ///
    /// Nothing issued here is prefixed, gated or time-bounded.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn report(&self, operation: &str, key: &str, error: Error) -> Error {
        self.diagnose(operation, format_args!("error on '{}': {}", key, error));
        self.metrics.record_error(key, &error.to_string());
        error
    }

    fn diagnose(&self, operation: &str, message: fmt::Arguments<'_>) {
        if self.config.debug_logging {
            debug!("[cache.{}] {}", operation, message);
        }
    }
}

#[cfg(feature = "redis")]
impl CacheSession<crate::backend::RedisBackend> {
    /// Build a pooled Redis backend from `config` and health-check it.
    ///
    /// # Errors
    ///
    /// Same as [`CacheSession::new`].
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let backend = crate::backend::RedisBackend::new(&config)?;
        Self::new(backend, config).await
    }
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct TestCache {
        id: i32,
        name: String,
    }

    impl CacheCandidate for TestCache {
        fn cache_key(&self, _parent1: &str, parent2: &str) -> String {
            format!("TEST:KEY:{}", parent2)
        }

        fn master_key() -> &'static str {
            "TEST:KEY:"
        }

        fn default_expiration() -> Option<Duration> {
            Some(Duration::from_secs(5 * 60))
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Untimed {
        id: u32,
    }

    impl CacheCandidate for Untimed {
        fn cache_key(&self, parent1: &str, _parent2: &str) -> String {
            format!("UNTIMED:{}:{}", parent1, self.id)
        }

        fn master_key() -> &'static str {
            "UNTIMED:"
        }
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            database_index: 4,
            key_prefix: "test:".to_string(),
            debug_logging: true,
            ..Default::default()
        }
    }

    async fn test_session() -> (CacheSession<InMemoryBackend>, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        let session = CacheSession::new(backend.clone(), test_config())
            .await
            .expect("Failed to create session");
        session.register_candidate::<TestCache>("test item for cache");
        (session, backend)
    }

    #[tokio::test]
    async fn test_set_then_get_scan() {
        let (session, backend) = test_session().await;
        let record = TestCache {
            id: 1,
            name: "AAA".to_string(),
        };

        session
            .set(&record, "p1", "p2")
            .await
            .expect("Failed to set");

        let stored = backend
            .get("test:TEST:KEY:p2")
            .await
            .expect("Failed to get")
            .expect("Physical key missing");
        assert_eq!(stored, r#"{"Id":1,"Name":"AAA"}"#);

        let scanned: TestCache = session
            .get_scan("p1", "p2", &TestCache::default())
            .await
            .expect("Failed to scan");
        assert_eq!(scanned, record);

        let by_key: TestCache = session
            .get_scan_by_key(&record.cache_key("p1", "p2"))
            .await
            .expect("Failed to scan by key");
        assert_eq!(by_key, record);
    }

    #[tokio::test]
    async fn test_set_uses_candidate_expiration() {
        let (session, backend) = test_session().await;
        session
            .set(&TestCache::default(), "p1", "p2")
            .await
            .expect("Failed to set");

        let ttl = backend.ttl("test:TEST:KEY:p2").await.expect("TTL missing");
        assert!(ttl > Duration::from_secs(4 * 60) && ttl <= Duration::from_secs(5 * 60));
    }

    #[tokio::test]
    async fn test_set_falls_back_to_session_expiration() {
        let backend = InMemoryBackend::new();
        let config = SessionConfig {
            default_expiration_minutes: 2,
            ..test_config()
        };
        let session = CacheSession::new(backend.clone(), config)
            .await
            .expect("Failed to create session");
        session.register_candidate::<Untimed>("no expiration of its own");

        session
            .set(&Untimed { id: 9 }, "org", "")
            .await
            .expect("Failed to set");

        let ttl = backend.ttl("test:UNTIMED:org:9").await.expect("TTL missing");
        assert!(ttl <= Duration::from_secs(120) && ttl > Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_zero_expiration_persists() {
        let (session, backend) = test_session().await;
        session
            .set_with_expiration(&TestCache::default(), Duration::ZERO, "p1", "p2")
            .await
            .expect("Failed to set");

        assert!(backend.get("test:TEST:KEY:p2").await.expect("get").is_some());
        assert_eq!(backend.ttl("test:TEST:KEY:p2").await, None);
    }

    #[tokio::test]
    async fn test_unregistered_write_is_refused() {
        let (session, backend) = test_session().await;

        let result = session.set(&Untimed { id: 1 }, "a", "b").await;
        assert_eq!(result, Err(Error::Unregistered("UNTIMED:".to_string())));

        let result = session
            .set_slice(Some(&[Untimed { id: 1 }][..]), "a", "b", &Untimed { id: 0 })
            .await;
        assert!(matches!(result, Err(Error::Unregistered(_))));

        assert_eq!(backend.len().await, 0);
    }

    #[tokio::test]
    async fn test_absent_record_is_invalid() {
        let (session, backend) = test_session().await;

        let absent: Option<TestCache> = None;
        let result = session.set(&absent, "p1", "p2").await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let result = session
            .set_slice::<TestCache>(None, "p1", "p2", &TestCache::default())
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        assert_eq!(backend.len().await, 0);
    }

    #[tokio::test]
    async fn test_absent_check_precedes_registration_check() {
        let (session, _backend) = test_session().await;
        let absent: Option<Untimed> = None;

        let result = session.set(&absent, "a", "b").await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_present_option_is_written() {
        let (session, _backend) = test_session().await;
        let present = Some(TestCache {
            id: 3,
            name: "CCC".to_string(),
        });

        session.set(&present, "p1", "opt").await.expect("Failed to set");
        let back: TestCache = session
            .get_scan("p1", "opt", &TestCache::default())
            .await
            .expect("Failed to scan");
        assert_eq!(back.id, 3);
    }

    #[tokio::test]
    async fn test_slice_round_trip() {
        let (session, backend) = test_session().await;
        let values = vec![
            TestCache {
                id: 1,
                name: "A".to_string(),
            },
            TestCache {
                id: 2,
                name: "B".to_string(),
            },
        ];

        session
            .set_slice(Some(values.as_slice()), "p1", "list", &TestCache::default())
            .await
            .expect("Failed to set slice");

        // One envelope under one physical key.
        assert_eq!(backend.len().await, 1);

        let back = session
            .get_slice("p1", "list", &TestCache::default())
            .await
            .expect("Failed to get slice");
        assert_eq!(back, values);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slice_with_expiration() {
        let (session, backend) = test_session().await;
        session
            .set_slice_with_expiration(
                Some(&[TestCache::default()][..]),
                "p1",
                "short",
                Duration::from_secs(30),
                &TestCache::default(),
            )
            .await
            .expect("Failed to set slice");

        assert_eq!(
            backend.ttl("test:TEST:KEY:short").await,
            Some(Duration::from_secs(30))
        );

        tokio::time::advance(Duration::from_secs(31)).await;
        let result = session
            .get_slice("p1", "short", &TestCache::default())
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reads_ignore_registration() {
        let (session, _backend) = test_session().await;
        session
            .set(&TestCache::default(), "p1", "p2")
            .await
            .expect("Failed to set");

        session.registry().unregister(TestCache::master_key());

        let back: Result<TestCache> = session.get_scan("p1", "p2", &TestCache::default()).await;
        assert!(back.is_ok());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (session, _backend) = test_session().await;
        let result = session.get("nope").await;

        assert_eq!(result, Err(Error::NotFound("test:nope".to_string())));
        assert!(result.unwrap_err().is_backend_error());
    }

    #[tokio::test]
    async fn test_get_scan_bad_envelope() {
        let (session, _backend) = test_session().await;
        session
            .set_str("not json", "TEST:KEY:broken", Duration::from_secs(60))
            .await
            .expect("Failed to set");

        let result: Result<TestCache> = session
            .get_scan("p1", "broken", &TestCache::default())
            .await;
        assert!(matches!(result, Err(Error::DeserializationError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_str_and_expiry() {
        let (session, _backend) = test_session().await;
        session
            .set_str("hello", "greet", Duration::from_secs(60))
            .await
            .expect("Failed to set");

        assert_eq!(session.get("greet").await.expect("get"), "hello");

        tokio::time::advance(Duration::from_secs(61)).await;
        let result = session.get("greet").await;
        assert!(result.as_ref().is_err_and(Error::is_not_found));
    }

    #[tokio::test]
    async fn test_counters() {
        let (session, backend) = test_session().await;
        session
            .counter_set(10, "visits", Duration::from_secs(60))
            .await
            .expect("counter_set");

        assert_eq!(session.incr("visits").await.expect("incr"), 11);
        assert_eq!(session.incr_by("visits", 4).await.expect("incr_by"), 15);
        assert_eq!(session.decr("visits").await.expect("decr"), 14);
        assert_eq!(session.decr_by("visits", 10).await.expect("decr_by"), 4);
        assert_eq!(session.counter_get("visits").await.expect("counter_get"), 4);

        assert_eq!(
            backend.get("test:visits").await.expect("get"),
            Some("4".to_string())
        );
    }

    #[tokio::test]
    async fn test_counter_get_non_integer() {
        let (session, _backend) = test_session().await;
        session
            .set_str("abc", "word", Duration::from_secs(60))
            .await
            .expect("set_str");

        assert!(matches!(
            session.counter_get("word").await,
            Err(Error::DeserializationError(_))
        ));
        assert!(matches!(
            session.counter_get("missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_keys_and_deletes() {
        let (session, backend) = test_session().await;
        for key in ["a:1", "a:2", "b:1"] {
            session
                .set_str("x", key, Duration::from_secs(60))
                .await
                .expect("set_str");
        }
        backend
            .set("other:a:1", "x".to_string(), None)
            .await
            .expect("set");

        let keys = session.get_keys("a:*").await.expect("get_keys");
        assert_eq!(keys, vec!["test:a:1".to_string(), "test:a:2".to_string()]);
        assert!(session.get_keys("zzz*").await.expect("get_keys").is_empty());

        assert_eq!(session.del_key("b:1").await.expect("del_key"), 1);
        assert_eq!(session.del_key("b:1").await.expect("del_key"), 0);

        let logical: Vec<&str> = keys.iter().map(|k| session.logical_key(k)).collect();
        assert_eq!(logical, vec!["a:1", "a:2"]);
        assert_eq!(session.del_keys(&logical).await.expect("del_keys"), 2);
        assert_eq!(session.del_keys::<&str>(&[]).await.expect("del_keys"), 0);

        // Keys outside the prefix are never touched.
        assert!(backend.get("other:a:1").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn test_del_by_pattern() {
        let (session, backend) = test_session().await;
        for parent in ["x", "y", "z"] {
            session
                .set(&TestCache::default(), "p1", parent)
                .await
                .expect("set");
        }

        let listed = session.get_keys("TEST:KEY:*").await.expect("get_keys");
        let removed = session
            .del_by_pattern("TEST:KEY:*")
            .await
            .expect("del_by_pattern");
        assert!(removed <= listed.len() as u64);
        assert_eq!(removed, 3);
        assert_eq!(backend.len().await, 0);

        assert_eq!(
            session.del_by_pattern("TEST:KEY:*").await.expect("del_by_pattern"),
            0
        );
    }

    #[tokio::test]
    async fn test_candidate_listing() {
        let (session, _backend) = test_session().await;
        session.register_candidate::<TestCache>("renamed");
        session.register_candidate::<Untimed>("untimed");

        let listed = session.list_candidates();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed["TEST:KEY:"], "renamed");
        assert!(session.is_registered("UNTIMED:"));
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_registries() {
        let (first, _) = test_session().await;
        let second = CacheSession::new(InMemoryBackend::new(), test_config())
            .await
            .expect("Failed to create session");

        assert!(first.is_registered("TEST:KEY:"));
        assert!(!second.is_registered("TEST:KEY:"));
    }

    #[tokio::test]
    async fn test_key_helpers() {
        let (session, _backend) = test_session().await;
        assert_eq!(session.physical_key("TEST:KEY:p2"), "test:TEST:KEY:p2");
        assert_eq!(session.logical_key("test:TEST:KEY:p2"), "TEST:KEY:p2");
        assert_eq!(session.logical_key("other:key"), "other:key");
    }

    #[derive(Clone)]
    struct StalledBackend;

    impl CacheBackend for StalledBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn delete(&self, _keys: &[String]) -> Result<u64> {
            Err(Error::BackendError("connection reset".to_string()))
        }

        async fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }

        async fn incr_by(&self, _key: &str, _delta: i64) -> Result<i64> {
            Err(Error::BackendError("connection reset".to_string()))
        }

        async fn decr_by(&self, _key: &str, _delta: i64) -> Result<i64> {
            Err(Error::BackendError("connection reset".to_string()))
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_are_time_bounded() {
        let session = CacheSession::new(StalledBackend, test_config())
            .await
            .expect("Failed to create session");
        session.register_candidate::<TestCache>("test");

        let result = session.set(&TestCache::default(), "p1", "p2").await;
        assert!(matches!(result, Err(Error::Timeout(_))));

        let result = session.get("k").await;
        assert!(matches!(result, Err(Error::Timeout(_))));

        let result = session.del_by_pattern("*").await;
        assert!(result.is_err_and(|e| e.is_backend_error()));

        let result = session.incr("k").await;
        assert!(matches!(result, Err(Error::BackendError(_))));

        let result = session.del_key("k").await;
        assert!(matches!(result, Err(Error::BackendError(_))));
    }

    #[derive(Clone)]
    struct DeadBackend;

    impl CacheBackend for DeadBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _keys: &[String]) -> Result<u64> {
            Ok(0)
        }

        async fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn incr_by(&self, _key: &str, _delta: i64) -> Result<i64> {
            Ok(0)
        }

        async fn decr_by(&self, _key: &str, _delta: i64) -> Result<i64> {
            Ok(0)
        }

        async fn ping(&self) -> Result<()> {
            Err(Error::BackendError("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_health_check_aborts_session() {
        let result = CacheSession::new(DeadBackend, test_config()).await;
        assert!(matches!(result, Err(Error::BackendError(_))));
    }

    #[derive(Default)]
    struct RecordingMetrics {
        events: Mutex<Vec<String>>,
    }

    impl CacheMetrics for RecordingMetrics {
        fn record_hit(&self, key: &str, _duration: Duration) {
            self.events.lock().expect("lock").push(format!("hit {}", key));
        }

        fn record_miss(&self, key: &str, _duration: Duration) {
            self.events.lock().expect("lock").push(format!("miss {}", key));
        }

        fn record_set(&self, key: &str, _duration: Duration) {
            self.events.lock().expect("lock").push(format!("set {}", key));
        }

        fn record_delete(&self, key: &str, removed: u64, _duration: Duration) {
            self.events
                .lock()
                .expect("lock")
                .push(format!("delete {} {}", key, removed));
        }

        fn record_error(&self, key: &str, _error: &str) {
            self.events.lock().expect("lock").push(format!("error {}", key));
        }
    }

    #[tokio::test]
    async fn test_out_of_range_expiration_is_an_error() {
        let (session, backend) = test_session().await;
        session.register_candidate::<Untimed>("untimed");

        assert!(matches!(
            session.set_str("v", "k", Duration::MAX).await,
            Err(Error::BackendError(_))
        ));
        assert!(matches!(
            session.counter_set(1, "c", Duration::MAX).await,
            Err(Error::BackendError(_))
        ));
        assert!(matches!(
            session
                .set_with_expiration(
                    &Untimed { id: 3 },
                    Duration::from_secs(u64::MAX / 2),
                    "org",
                    ""
                )
                .await,
            Err(Error::BackendError(_))
        ));
        let values = vec![Untimed { id: 4 }];
        assert!(matches!(
            session
                .set_slice_with_expiration(
                    Some(values.as_slice()),
                    "org",
                    "",
                    Duration::MAX,
                    &values[0]
                )
                .await,
            Err(Error::BackendError(_))
        ));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_unbounded_default_expiration_rejected() {
        let config = SessionConfig {
            default_expiration_minutes: u64::MAX,
            ..test_config()
        };
        let result = CacheSession::new(InMemoryBackend::new(), config).await;
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_metrics_hooks() {
        let metrics = Arc::new(RecordingMetrics::default());
        let session = SessionBuilder::new(InMemoryBackend::new())
            .config(test_config())
            .metrics(metrics.clone())
            .candidate::<TestCache>("test")
            .build()
            .await
            .expect("Failed to build session");

        session
            .set(&TestCache::default(), "p1", "p2")
            .await
            .expect("set");
        let _: TestCache = session
            .get_scan("p1", "p2", &TestCache::default())
            .await
            .expect("get_scan");
        let _ = session.get("missing").await;
        let _ = session.set(&Untimed { id: 1 }, "a", "b").await;
        session.del_key("TEST:KEY:p2").await.expect("del_key");

        let events = metrics.events.lock().expect("lock").clone();
        assert_eq!(
            events,
            vec![
                "set test:TEST:KEY:p2".to_string(),
                "hit test:TEST:KEY:p2".to_string(),
                "miss test:missing".to_string(),
                "error test:UNTIMED:a:1".to_string(),
                "delete test:TEST:KEY:p2 1".to_string(),
            ]
        );
    }
}
