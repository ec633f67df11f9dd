//! Orchestrator-specific error types

use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Failed to start process '{name}': {message}")]
    ProcessStart { name: String, message: String },

    #[error("Server '{name}' is already registered")]
    DuplicateServer { name: String },

    #[error("Server '{name}' needs a readiness timeout greater than zero")]
    InvalidTimeout { name: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Artifact listing failed for {path}: {message}")]
    ArtifactError { path: String, message: String },

    #[error("Shared component error")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn process_start(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::ProcessStart {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Spawn failures are fail-open for servers; everything else halts the pipeline
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::ProcessStart { .. })
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
