//! LLM-backed generator and refiner.

use async_trait::async_trait;
use log::{debug, warn};

use super::parser::extract_python;
use super::prompts::{GENERATION_SYSTEM, REFINEMENT_SYSTEM, generation_prompt, refinement_prompt};
use super::{ArtifactGenerator, ArtifactRefiner, RefinementRequest};
use crate::domain::ArtifactSpec;
use crate::error::{RenderError, Result};
use crate::llm::{CompletionRequest, LlmClient};

/// Writes and repairs scene scripts through an LLM
pub struct LlmArtifactWriter<L> {
    client: L,
}

impl<L: LlmClient> LlmArtifactWriter<L> {
    pub fn new(client: L) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &L {
        &self.client
    }

    async fn ask(&self, system: &str, prompt: String) -> Result<String> {
        let request = CompletionRequest::new(system).with_user_message(prompt);
        let response = self.client.complete(request).await?;
        if response.stop_reason.is_truncated() {
            warn!("{} response hit max_tokens; code may be incomplete", self.client.model());
        }

        let code = extract_python(&response.content);
        if code.is_empty() {
            return Err(RenderError::Generation(format!("{} returned no code", self.client.model())));
        }
        Ok(code)
    }
}

#[async_trait]
impl<L: LlmClient> ArtifactGenerator for LlmArtifactWriter<L> {
    async fn generate(&self, spec: &ArtifactSpec) -> Result<String> {
        debug!("Generating scene for chapter {}", spec.chapter);
        self.ask(GENERATION_SYSTEM, generation_prompt(spec)).await
    }
}

#[async_trait]
impl<L: LlmClient> ArtifactRefiner for LlmArtifactWriter<L> {
    async fn refine(&self, request: &RefinementRequest) -> Result<String> {
        debug!("Refining scene ({})", request.frame_summary);
        self.ask(REFINEMENT_SYSTEM, refinement_prompt(request)).await
    }
}
