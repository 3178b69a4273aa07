//! Candidate generation and repair
//!
//! The refinement loop depends only on the `ArtifactGenerator` and
//! `ArtifactRefiner` traits. `LlmArtifactWriter` implements both on top of
//! any `LlmClient`. `ScriptWriter` fills in the animation script of
//! syllabus chapters before they reach the loop.

pub mod parser;
pub mod prompts;
mod script;
mod writer;

use async_trait::async_trait;

use crate::domain::ArtifactSpec;
use crate::error::Result;

pub use parser::{extract_code_blocks, extract_python};
pub use script::{LlmScriptWriter, ScriptWriter, parse_script};
pub use writer::LlmArtifactWriter;

/// Evidence handed to the refiner after a failed execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementRequest {
    /// Candidate that was executed
    pub code: String,
    pub stdout: String,
    pub stderr: String,
    /// "N frames provided." or "No frames provided."
    pub frame_summary: String,
}

/// Produces the first candidate for an artifact
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate(&self, spec: &ArtifactSpec) -> Result<String>;
}

/// Produces a corrected candidate from a failed one
#[async_trait]
pub trait ArtifactRefiner: Send + Sync {
    async fn refine(&self, request: &RefinementRequest) -> Result<String>;
}
