//! Error Handling
//!
//! Unified error type for the planning engine.
//! Uses thiserror for ergonomic error definitions.
//!
//! Only programmer errors surface as `EngineError` from the facade. Step
//! failures, deadlocks and cancellation are recorded in the execution result.

use thiserror::Error;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum EngineError {
    /// Planning context failed structural checks
    #[error("Invalid planning context: {0}")]
    Context(String),

    /// Operation requires a started service
    #[error("Planning service is not running")]
    NotRunning,

    /// Operation requires a text generator
    #[error("No text generator configured")]
    MissingGenerator,

    /// Operation requires a capability registry
    #[error("No capability registry configured")]
    MissingRegistry,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine errors
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Create a context error
    pub fn context(msg: impl Into<String>) -> Self {
        Self::Context(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("execution task failed: {}", err))
    }
}

impl From<EngineError> for String {
    fn from(err: EngineError) -> String {
        err.to_string()
    }
}
