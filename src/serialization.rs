//! JSON envelope used for every value written by a session.
//!
//! Records are stored as plain JSON text so that data written by this crate
//! stays readable by any other client of the same store.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a value into its stored form.
///
/// # Errors
///
/// Returns `Error::SerializationError` if the value cannot be represented as JSON
/// (for example a map with non-string keys).
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::SerializationError(e.to_string()))
}

/// Decode a stored envelope into `D`.
///
/// # Errors
///
/// Returns `Error::DeserializationError` if the text is not valid JSON or does
/// not match the shape of `D`.
pub fn decode<D: DeserializeOwned>(envelope: &str) -> Result<D> {
    serde_json::from_str(envelope).map_err(|e| Error::DeserializationError(e.to_string()))
}
