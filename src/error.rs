//! Error types for cache-gate operations.

use std::fmt;

/// Errors returned by every fallible cache-gate operation.
///
/// `BackendError`, `NotFound` and `Timeout` together form the backend class;
/// use [`Error::is_backend_error`] when the exact cause does not matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An absent value was passed to a write operation.
    InvalidArgument(String),

    /// A write was attempted for a master key that was never registered.
    Unregistered(String),

    /// The codec could not encode the value.
    SerializationError(String),

    /// The codec could not decode the stored envelope.
    DeserializationError(String),

    /// The backend store reported a failure.
    BackendError(String),

    /// The requested key does not exist (or has expired).
    NotFound(String),

    /// A backend call exceeded its time budget.
    Timeout(String),

    /// Invalid session or backend configuration.
    ConfigError(String),
}

impl Error {
    /// True for every failure that originated in the backend store,
    /// including missing keys and timeouts.
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            Error::BackendError(_) | Error::NotFound(_) | Error::Timeout(_)
        )
    }

    /// True when a read found no value under the requested key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Unregistered(msg) => write!(f, "Invalid or unregistered candidate: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::NotFound(msg) => write!(f, "Key not found: {}", msg),
            Error::Timeout(msg) => write!(f, "Operation timed out: {}", msg),
            Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Result type for cache-gate operations.
pub type Result<T> = std::result::Result<T, Error>;
