//! Fenced code block extraction for LLM responses.

use std::collections::HashMap;

const FENCE: &str = "```";

/// Collect fenced code blocks keyed by their language tag.
///
/// Untagged blocks are keyed as `"unknown"`. When the same tag appears more
/// than once the last block wins. Block contents are trimmed.
pub fn extract_code_blocks(text: &str) -> HashMap<String, String> {
    let mut blocks = HashMap::new();
    let mut rest = text;

    while let Some(open) = rest.find(FENCE) {
        let after_fence = &rest[open + FENCE.len()..];
        let Some(newline) = after_fence.find('\n') else {
            break;
        };

        let tag = after_fence[..newline].trim();
        // An opening fence carries at most a single word tag
        if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            rest = after_fence;
            continue;
        }

        let body = &after_fence[newline + 1..];
        let Some(close) = body.find(FENCE) else {
            break;
        };

        let key = if tag.is_empty() { "unknown" } else { tag };
        blocks.insert(key.to_string(), body[..close].trim().to_string());
        rest = &body[close + FENCE.len()..];
    }

    blocks
}

/// The Python source in an LLM response.
///
/// Prefers a ```python block, then an untagged block, and falls back to the
/// whole response when there are no fences at all.
pub fn extract_python(text: &str) -> String {
    let mut blocks = extract_code_blocks(text);
    blocks
        .remove("python")
        .or_else(|| blocks.remove("py"))
        .or_else(|| blocks.remove("unknown"))
        .unwrap_or_else(|| text.trim().to_string())
}
