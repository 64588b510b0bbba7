//! Key derivation contract that every cacheable record type implements.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait that all records written through a [`CacheSession`](crate::CacheSession) must implement.
///
/// A record type is only accepted for writes once its [`master_key`](Self::master_key)
/// has been registered with the session's [`CandidateRegistry`](crate::CandidateRegistry).
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use cache_gate::CacheCandidate;
/// use std::time::Duration;
///
/// #[derive(Serialize, Deserialize)]
/// pub struct Employment {
///     pub id: u64,
///     pub employer_name: String,
/// }
///
/// impl CacheCandidate for Employment {
///     fn cache_key(&self, loanapp_id: &str, _parent2: &str) -> String {
///         format!("EMPLOYMENT:{}:{}", loanapp_id, self.id)
///     }
///
///     fn master_key() -> &'static str {
///         "EMPLOYMENT:"
///     }
///
///     fn default_expiration() -> Option<Duration> {
///         Some(Duration::from_secs(300))
///     }
/// }
///
/// let employment = Employment { id: 7, employer_name: "Acme".into() };
/// assert_eq!(employment.cache_key("loan_1", ""), "EMPLOYMENT:loan_1:7");
/// ```
pub trait CacheCandidate: Serialize + for<'de> Deserialize<'de> + Send + Sync {
    /// Derive the logical (unprefixed) cache key from up to two parent identifiers.
    ///
    /// Must be deterministic for the same parents. By convention the result
    /// begins with [`master_key`](Self::master_key), but nothing enforces it.
    fn cache_key(&self, parent1: &str, parent2: &str) -> String;

    /// Constant pattern identifying this type in the registry.
    ///
    /// Used for registration lookup and display only, never as a storage key.
    fn master_key() -> &'static str;

    /// Expiration applied by [`CacheSession::set`](crate::CacheSession::set).
    ///
    /// `None` falls back to the session's configured default expiration.
    fn default_expiration() -> Option<Duration> {
        None
    }

    /// Whether this value stands for "no record" and must be refused by writes.
    fn is_absent(&self) -> bool {
        false
    }
}

/// `None` is an absent record; `Some` delegates to the wrapped record.
impl<T: CacheCandidate> CacheCandidate for Option<T> {
    fn cache_key(&self, parent1: &str, parent2: &str) -> String {
        match self {
            Some(record) => record.cache_key(parent1, parent2),
            None => T::master_key().to_string(),
        }
    }

    fn master_key() -> &'static str {
        T::master_key()
    }

    fn default_expiration() -> Option<Duration> {
        T::default_expiration()
    }

    fn is_absent(&self) -> bool {
        self.as_ref().map_or(true, CacheCandidate::is_absent)
    }
}
