//! Execution sandbox - runs candidate artifacts and captures the outcome.
//!
//! The refinement loop only sees the `ExecutionSandbox` trait. `ManimSandbox`
//! is the production implementation that shells out to the `manim` CLI;
//! `MockSandbox` replays scripted outputs.

mod manim;
mod mock;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use manim::{ManimSandbox, SandboxConfig, find_program};
pub use mock::MockSandbox;

/// Exit status reported when the execution tool is not installed
pub const TOOL_UNAVAILABLE_EXIT: i32 = -1;

/// Exit status reported when an execution exceeds its wall-clock cap
pub const TIMED_OUT_EXIT: i32 = 124;

/// Captured result of one execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl ExecutionOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_status: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status,
        }
    }

    /// Successful run with the given stdout
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::new(stdout, "", 0)
    }

    /// Failed run with the given stderr and exit status
    pub fn failure(stderr: impl Into<String>, exit_status: i32) -> Self {
        Self::new("", stderr, exit_status)
    }

    /// The execution tool is missing
    pub fn tool_unavailable(message: impl Into<String>) -> Self {
        Self::new("", message, TOOL_UNAVAILABLE_EXIT)
    }

    pub fn is_success(&self) -> bool {
        self.exit_status == 0
    }

    pub fn is_tool_unavailable(&self) -> bool {
        self.exit_status == TOOL_UNAVAILABLE_EXIT
    }
}

/// Runs a candidate artifact and reports what happened
#[async_trait]
pub trait ExecutionSandbox: Send + Sync {
    /// Execute the artifact at `artifact`.
    ///
    /// A missing execution tool is reported through the returned output
    /// (`exit_status == TOOL_UNAVAILABLE_EXIT`) or as
    /// `RenderError::SandboxUnavailable`; both are treated as fatal.
    async fn execute(&self, artifact: &Path) -> Result<ExecutionOutput>;

    /// Where a (possibly partial) render of `artifact` ends up, if any
    fn media_path(&self, artifact: &Path) -> Option<std::path::PathBuf> {
        let _ = artifact;
        None
    }

    /// Get a description of this sandbox
    fn description(&self) -> &str {
        "sandbox"
    }
}
