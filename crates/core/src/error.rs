//! Core Error Types
//!
//! Errors raised by capability handlers and the capability registry. Kept
//! dependency-free (thiserror + serde_json only) so capability crates can
//! depend on this crate without pulling in the engine.

use thiserror::Error;

/// Core error type shared by capabilities and the registry.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A capability handler failed while running
    #[error("Capability error: {0}")]
    Capability(String),

    /// Invalid parameters passed to a capability
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a capability failure
    pub fn capability(msg: impl Into<String>) -> Self {
        Self::Capability(msg.into())
    }

    /// Create an invalid-parameters error
    pub fn invalid_parameters(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
