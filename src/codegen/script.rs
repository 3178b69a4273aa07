//! Animation scripts for syllabus chapters that arrive without one.

use async_trait::async_trait;
use log::{debug, warn};

use super::parser::extract_code_blocks;
use super::prompts::{SCRIPT_SYSTEM, script_prompt};
use crate::domain::{AnimationScript, SyllabusEntry};
use crate::error::{RenderError, Result};
use crate::llm::{CompletionRequest, LlmClient};

/// Writes the animation script a chapter's scene is generated from
#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn write_script(&self, subject: &str, entry: &SyllabusEntry) -> Result<AnimationScript>;
}

/// `ScriptWriter` backed by an LLM that answers with a JSON script
pub struct LlmScriptWriter<L> {
    client: L,
}

impl<L: LlmClient> LlmScriptWriter<L> {
    pub fn new(client: L) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &L {
        &self.client
    }
}

#[async_trait]
impl<L: LlmClient> ScriptWriter for LlmScriptWriter<L> {
    async fn write_script(&self, subject: &str, entry: &SyllabusEntry) -> Result<AnimationScript> {
        debug!("Writing animation script for chapter {}", entry.chapter);
        let request = CompletionRequest::new(SCRIPT_SYSTEM).with_user_message(script_prompt(subject, entry));
        let response = self.client.complete(request).await?;
        if response.stop_reason.is_truncated() {
            warn!("{} response hit max_tokens; script may be incomplete", self.client.model());
        }
        parse_script(&response.content)
    }
}

/// Decode an animation script from an LLM response.
///
/// Reads a ```json block, then an untagged block, then the whole response.
pub fn parse_script(text: &str) -> Result<AnimationScript> {
    let mut blocks = extract_code_blocks(text);
    let body = blocks
        .remove("json")
        .or_else(|| blocks.remove("unknown"))
        .unwrap_or_else(|| text.trim().to_string());

    serde_json::from_str(&body).map_err(|e| RenderError::Generation(format!("malformed animation script: {}", e)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::llm::MockLlmClient;

    const SCRIPT: &str = r#"{
        "title": "Limits",
        "narration": "What happens as x gets close to a point?",
        "visual_elements": [{"timestamp": "00:10", "description": "Zoom into the curve"}],
        "equations": ["\\lim_{x \\to a} f(x) = L"],
        "key_timestamps": {"Intro": "00:00", "Key insight": "01:15"},
        "visual_style": "minimal vector style"
    }"#;

    fn entry() -> SyllabusEntry {
        serde_json::from_value(json!({
            "chapter": "Limits",
            "explanation": "Limits describe where a function is heading.",
            "content": ["One-sided limits", "Continuity"],
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_script_from_json_block() {
        let script = parse_script(&format!("Here it is:\n```json\n{}\n```", SCRIPT)).unwrap();
        assert_eq!(script.title, "Limits");
        assert_eq!(script.visual_elements[0].description, "Zoom into the curve");
        assert_eq!(script.key_timestamps["Key insight"], "01:15");
    }

    #[test]
    fn test_parse_script_from_bare_json() {
        let script = parse_script(SCRIPT).unwrap();
        assert_eq!(script.visual_style, "minimal vector style");
    }

    #[test]
    fn test_parse_script_rejects_prose() {
        let err = parse_script("I could not think of a script.").unwrap_err();
        assert!(err.to_string().contains("malformed animation script"));
    }

    #[tokio::test]
    async fn test_write_script_sends_chapter_context() {
        let writer = LlmScriptWriter::new(MockLlmClient::with_texts([format!("```json\n{}\n```", SCRIPT)]));
        let script = writer.write_script("Mathematics", &entry()).await.unwrap();
        assert_eq!(script.narration, "What happens as x gets close to a point?");

        let requests = writer.client().requests();
        assert_eq!(requests[0].system, SCRIPT_SYSTEM);
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.contains("Subject: Mathematics"));
        assert!(prompt.contains("Topic: Limits"));
        assert!(prompt.contains("Insight: Limits describe where a function is heading."));
        assert!(prompt.contains("- Continuity"));
    }

    #[tokio::test]
    async fn test_write_script_llm_error_propagates() {
        let writer = LlmScriptWriter::new(MockLlmClient::new());
        let err = writer.write_script("Mathematics", &entry()).await.unwrap_err();
        assert!(matches!(err, RenderError::Generation(_)));
    }
}
