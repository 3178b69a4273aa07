//! Error types for renderloop
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in renderloop
#[derive(Debug, Error)]
pub enum RenderError {
    /// Job id or upstream reference does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation requested against a job in the wrong lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The execution tool is missing; refinement cannot help
    #[error("Sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    /// A candidate artifact ran and exited non-zero
    #[error("Execution failed with exit status {exit_status}: {stderr}")]
    ExecutionFailure { exit_status: i32, stderr: String },

    /// Generator, refiner or LLM call failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Configuration could not be loaded or is invalid
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for renderloop operations
pub type Result<T> = std::result::Result<T, RenderError>;
