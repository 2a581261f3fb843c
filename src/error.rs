//! Error types for cache operations
//!
//! This module defines the errors raised by cache backends, entry decoding,
//! fresh value validation and request batching. Errors produced by a caller's
//! fresh value function are never wrapped in these types.

use thiserror::Error;

/// Main error type for cachified operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CachifiedError {
    /// Cache backend failed to read, write or delete
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// A cache entry did not have the `{ metadata, value }` shape
    #[error("Malformed cache entry for key {key}: {reason}")]
    MalformedEntry { key: String, reason: String },

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A freshly produced value was rejected by `check_value`
    #[error("Check failed for fresh value of {key}: {reason}")]
    InvalidFreshValue { key: String, reason: String },

    /// A batch was used after its loader was already started
    #[error("Batch already submitted")]
    BatchSubmitted,

    /// The batch loader returned a different number of values than requested
    #[error("Batch loader returned {actual} values for {expected} requests")]
    BatchSizeMismatch { expected: usize, actual: usize },

    /// The batch loader went away before delivering a value
    #[error("Batch was dropped before a value was delivered")]
    BatchDropped,

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CachifiedError>;

impl From<String> for CachifiedError {
    fn from(s: String) -> Self {
        CachifiedError::Other(s)
    }
}

impl From<&str> for CachifiedError {
    fn from(s: &str) -> Self {
        CachifiedError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for CachifiedError {
    fn from(e: serde_json::Error) -> Self {
        CachifiedError::SerializationError(e.to_string())
    }
}

// Lets callers whose fresh value functions fail with plain strings use them as `E`
impl From<CachifiedError> for String {
    fn from(e: CachifiedError) -> Self {
        e.to_string()
    }
}
