//! # cache-gate
//!
//! A typed, registration-gated front-end over a remote key-value store.
//!
//! ## Features
//!
//! - **Typed records:** Cache any type `T` that implements `CacheCandidate`
//! - **Registration gate:** Writes of unregistered record types are refused
//! - **Per-type keys and expiration:** Each type derives its own key from up to two parent ids
//! - **Backend agnostic:** In-memory and Redis backends, or your own `CacheBackend`
//! - **Portable envelope:** Records are stored as plain JSON
//! - **Bounded calls:** Every backend call runs under an operation-specific timeout
//!
//! ## Quick Start
//!
//! ```ignore
//! use cache_gate::{backend::InMemoryBackend, config::SessionConfig, CacheCandidate, SessionBuilder};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! // 1. Define your record
//! #[derive(Serialize, Deserialize)]
//! struct Employment {
//!     id: u64,
//!     employer_name: String,
//! }
//!
//! // 2. Implement CacheCandidate
//! impl CacheCandidate for Employment {
//!     fn cache_key(&self, loanapp_id: &str, _parent2: &str) -> String {
//!         format!("EMPLOYMENT:{}:{}", loanapp_id, self.id)
//!     }
//!
//!     fn master_key() -> &'static str {
//!         "EMPLOYMENT:"
//!     }
//!
//!     fn default_expiration() -> Option<Duration> {
//!         Some(Duration::from_secs(300))
//!     }
//! }
//!
//! // 3. Build a session and register the candidate
//! let session = SessionBuilder::new(InMemoryBackend::new())
//!     .config(SessionConfig { key_prefix: "app:".into(), ..Default::default() })
//!     .candidate::<Employment>("employment per loan application")
//!     .build()
//!     .await?;
//!
//! // 4. Use it
//! session.set(&employment, "loan_123", "").await?;
//! let cached: Employment = session.get_scan("loan_123", "", &employment).await?;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod builder;
pub mod candidate;
pub mod config;
pub mod error;
pub mod observability;
pub mod registry;
pub mod serialization;
pub mod session;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use builder::SessionBuilder;
pub use candidate::CacheCandidate;
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use registry::CandidateRegistry;
pub use session::CacheSession;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
