//! Error types for the Tally library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Tally operations.
#[derive(Debug, Error)]
pub enum TallyError {
    /// User-correctable input problem (bad index, missing required field).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The workflow is not in a state that allows the operation.
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// A backend collaborator failed; in-memory state is unchanged.
    #[error("Service '{service}' failed: {message}")]
    TransientService { service: String, message: String },

    /// Table input could not be interpreted.
    #[error("Data shape error: {0}")]
    DataShape(String),

    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error saving or loading persisted session state.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed JSON input, such as an extraction result.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TallyError {
    /// Build a transient service error.
    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        TallyError::TransientService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TallyError::TransientService { .. })
    }
}

/// Result type alias for Tally operations.
pub type Result<T> = std::result::Result<T, TallyError>;
