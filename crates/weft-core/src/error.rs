//! Error types for the Weft coordination layer.

use thiserror::Error;

/// A shared error type for the entire Weft workspace.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
#[derive(Error, Debug, Clone)]
pub enum WeftError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// A caller-supplied argument failed validation
    #[error("Invalid argument '{name}': expected {expected}")]
    InvalidArgument {
        name: &'static str,
        expected: String,
    },

    /// Platform transport error (deferred responses, message edits, ...)
    #[error("Platform error: {0}")]
    Platform(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: &'static str,
        message: String,
    },

    /// Storage backend error (persistence layer)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WeftError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an InvalidArgument error
    pub fn invalid_argument(name: &'static str, expected: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            expected: expected.into(),
        }
    }

    /// Creates a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<serde_json::Error> for WeftError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON",
            message: e.to_string(),
        }
    }
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, WeftError>;
