//! Error Handling
//!
//! Unified error types for the orchestration engine.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed task (missing prompt, missing source column)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Fatal configuration problems (fan-out list mismatch, bad column letter)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Backing-store read/write failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// Execution-context protocol failures
    #[error("Context error: {0}")]
    Context(String),

    /// Platform keep-awake call failures
    #[error("Keep-awake error: {0}")]
    KeepAwake(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine errors
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a context error
    pub fn context(msg: impl Into<String>) -> Self {
        Self::Context(msg.into())
    }

    /// Create a keep-awake error
    pub fn keep_awake(msg: impl Into<String>) -> Self {
        Self::KeepAwake(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert EngineError to a plain string for event payloads
impl From<EngineError> for String {
    fn from(err: EngineError) -> String {
        err.to_string()
    }
}
