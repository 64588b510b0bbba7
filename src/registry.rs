//! Registry of record types permitted to be written to the cache.

use crate::candidate::CacheCandidate;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Concurrent map of master key → human-readable description.
///
/// Registration is a write-time safety gate: it catches attempts to cache
/// types nobody meant to cache. It never inspects record contents and it is
/// never consulted on reads.
///
/// Cloning yields a handle to the same registry.
#[derive(Clone, Default)]
pub struct CandidateRegistry {
    candidates: Arc<DashMap<String, String>>,
}

impl CandidateRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its master key. Re-registering overwrites the description.
    pub fn register<T: CacheCandidate>(&self, description: impl Into<String>) {
        self.register_pattern(T::master_key(), description);
    }

    /// Register a raw master-key pattern.
    pub fn register_pattern(&self, master_key: impl Into<String>, description: impl Into<String>) {
        let master_key = master_key.into();
        let description = description.into();
        debug!("Registering cache candidate {} ({})", master_key, description);
        self.candidates.insert(master_key, description);
    }

    /// Remove a master key, returning its description if it was registered.
    pub fn unregister(&self, master_key: &str) -> Option<String> {
        self.candidates.remove(master_key).map(|(_, description)| description)
    }

    /// Snapshot of every registered master key with its description.
    pub fn list(&self) -> BTreeMap<String, String> {
        self.candidates
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Whether `master_key` may be written.
    pub fn is_registered(&self, master_key: &str) -> bool {
        self.candidates.contains_key(master_key)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
