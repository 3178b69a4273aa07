//! Final summary of one artifact's refinement loop.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::attempt::RefinementTrace;

/// How much trailing stdout/stderr a result keeps
pub const TRAILING_CHARS: usize = 2000;

/// Immutable outcome of one refinement loop run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementResult {
    /// Where the latest candidate is persisted
    #[serde(rename = "file")]
    pub artifact_path: PathBuf,
    pub chapter: String,
    #[serde(rename = "iterations")]
    pub iterations_used: u32,
    pub success: bool,
    #[serde(rename = "logs")]
    pub trailing_logs: String,
    #[serde(rename = "errors")]
    pub trailing_errors: String,
    /// Set when the loop short-circuited on a setup failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl RefinementResult {
    /// Summarize a finished trace
    pub fn from_trace(artifact_path: PathBuf, chapter: impl Into<String>, trace: &RefinementTrace) -> Self {
        let (logs, errors) = trace
            .last()
            .map(|a| (tail_chars(a.stdout(), TRAILING_CHARS), tail_chars(a.stderr(), TRAILING_CHARS)))
            .unwrap_or_default();

        Self {
            artifact_path,
            chapter: chapter.into(),
            iterations_used: trace.len() as u32,
            success: trace.succeeded(),
            trailing_logs: logs,
            trailing_errors: errors,
            aborted: None,
        }
    }

    /// Summarize a loop that aborted before (or between) executions
    pub fn aborted(artifact_path: PathBuf, chapter: impl Into<String>, trace: &RefinementTrace, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut result = Self::from_trace(artifact_path, chapter, trace);
        result.success = false;
        if result.trailing_errors.is_empty() {
            result.trailing_errors = tail_chars(&reason, TRAILING_CHARS);
        }
        result.aborted = Some(reason);
        result
    }
}

/// Last `max` characters of `s`, respecting char boundaries
pub fn tail_chars(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        return s.to_string();
    }
    s.chars().skip(count - max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attempt::Attempt;

    #[test]
    fn test_tail_chars_short_input() {
        assert_eq!(tail_chars("hello", 10), "hello");
        assert_eq!(tail_chars("", 10), "");
    }

    #[test]
    fn test_tail_chars_truncates_from_front() {
        assert_eq!(tail_chars("abcdef", 3), "def");
    }

    #[test]
    fn test_tail_chars_multibyte() {
        assert_eq!(tail_chars("ééééé", 2), "éé");
    }

    #[test]
    fn test_from_trace_uses_last_attempt() {
        let mut trace = RefinementTrace::new();
        trace.record(Attempt::new(0, "v1", "log one", "err one", 1));
        trace.record(Attempt::new(1, "v2", "log two", "err two", 1));

        let result = RefinementResult::from_trace(PathBuf::from("out/a.py"), "A", &trace);
        assert_eq!(result.iterations_used, 2);
        assert!(!result.success);
        assert_eq!(result.trailing_logs, "log two");
        assert_eq!(result.trailing_errors, "err two");
        assert!(result.aborted.is_none());
    }

    #[test]
    fn test_from_trace_bounds_trailing_text() {
        let mut trace = RefinementTrace::new();
        let long = "x".repeat(TRAILING_CHARS + 500);
        trace.record(Attempt::new(0, "v1", long.clone(), long, 1));

        let result = RefinementResult::from_trace(PathBuf::from("a.py"), "A", &trace);
        assert_eq!(result.trailing_logs.len(), TRAILING_CHARS);
        assert_eq!(result.trailing_errors.len(), TRAILING_CHARS);
    }

    #[test]
    fn test_aborted_with_empty_trace() {
        let trace = RefinementTrace::new();
        let result = RefinementResult::aborted(PathBuf::from("a.py"), "A", &trace, "manim not found");
        assert_eq!(result.iterations_used, 0);
        assert!(!result.success);
        assert_eq!(result.trailing_errors, "manim not found");
        assert_eq!(result.aborted.as_deref(), Some("manim not found"));
    }

    #[test]
    fn test_serialized_field_names() {
        let trace = RefinementTrace::new();
        let result = RefinementResult::from_trace(PathBuf::from("a.py"), "A", &trace);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["file"], "a.py");
        assert_eq!(json["iterations"], 0);
        assert!(json.get("aborted").is_none());
    }
}
