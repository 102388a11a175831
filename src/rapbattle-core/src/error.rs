//! Error types for the rap battle system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DebateError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Persona not found: {0}")]
    NotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Transient upstream failure: {0}")]
    Transient(String),

    #[error("Permanent upstream failure: {0}")]
    Permanent(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Store failure: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DebateError {
    /// Whether a caller may retry the failed call.
    pub fn is_transient(&self) -> bool {
        matches!(self, DebateError::Transient(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, DebateError::Cancelled)
    }
}
