//! Artifact specifications and the upstream syllabus entries they come from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One timed visual cue in an animation script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualElement {
    pub timestamp: String,
    pub description: String,
}

/// Structured description of the animation to generate for a chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationScript {
    pub title: String,
    pub narration: String,
    #[serde(default)]
    pub visual_elements: Vec<VisualElement>,
    #[serde(default)]
    pub equations: Vec<String>,
    #[serde(default)]
    pub key_timestamps: BTreeMap<String, String>,
    #[serde(default)]
    pub visual_style: String,
}

/// One chapter of an upstream syllabus job result
///
/// Only `chapter` and `animation` drive generation; the remaining syllabus
/// fields (unit, competencies, QA pairs, ...) ride along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllabusEntry {
    pub chapter: String,
    #[serde(default)]
    pub animation: Option<AnimationScript>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Input for one artifact run through the refinement loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Subject the whole batch belongs to (e.g. "Mathematics")
    pub subject: String,
    /// Logical unit name, also used to name the persisted artifact
    pub chapter: String,
    /// Generation target; specs without one are skipped
    pub animation: Option<AnimationScript>,
}

impl ArtifactSpec {
    pub fn new(subject: impl Into<String>, chapter: impl Into<String>, animation: Option<AnimationScript>) -> Self {
        Self {
            subject: subject.into(),
            chapter: chapter.into(),
            animation,
        }
    }

    pub fn from_entry(subject: &str, entry: SyllabusEntry) -> Self {
        Self::new(subject, entry.chapter, entry.animation)
    }

    /// Whether this spec carries a generation target
    pub fn is_refinable(&self) -> bool {
        self.animation.is_some()
    }

    /// File-name-safe form of the chapter name.
    ///
    /// Anything outside `[A-Za-z0-9_-]` becomes `_`, so the stem never
    /// contains a path separator or `..`.
    pub fn artifact_stem(&self) -> String {
        self.chapter
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> AnimationScript {
        AnimationScript {
            title: "Limits".to_string(),
            narration: "We approach a point".to_string(),
            visual_elements: vec![VisualElement {
                timestamp: "0:05".to_string(),
                description: "Draw axes".to_string(),
            }],
            equations: vec!["\\lim_{x \\to 0} x = 0".to_string()],
            key_timestamps: BTreeMap::new(),
            visual_style: "minimal".to_string(),
        }
    }

    #[test]
    fn test_is_refinable() {
        assert!(ArtifactSpec::new("Math", "Limits", Some(script())).is_refinable());
        assert!(!ArtifactSpec::new("Math", "Limits", None).is_refinable());
    }

    #[test]
    fn test_artifact_stem_replaces_spaces() {
        let spec = ArtifactSpec::new("Math", "Limits and Continuity", None);
        assert_eq!(spec.artifact_stem(), "Limits_and_Continuity");
    }

    #[test]
    fn test_artifact_stem_strips_path_characters() {
        let stem = |chapter: &str| ArtifactSpec::new("Math", chapter, None).artifact_stem();
        assert_eq!(stem("../../x"), "______x");
        assert_eq!(stem("a/b\\c"), "a_b_c");
        assert_eq!(stem("Taylor-Series (part 2)"), "Taylor-Series__part_2_");
        assert_eq!(stem("Négation"), "N_gation");
    }

    #[test]
    fn test_syllabus_entry_keeps_extra_fields() {
        let json = serde_json::json!({
            "unit_title": "Calculus",
            "chapter": "Derivatives",
            "competencies": ["differentiate"],
        });
        let entry: SyllabusEntry = serde_json::from_value(json).unwrap();
        assert_eq!(entry.chapter, "Derivatives");
        assert!(entry.animation.is_none());
        assert_eq!(entry.extra["unit_title"], "Calculus");
    }

    #[test]
    fn test_syllabus_entry_with_animation() {
        let json = serde_json::json!({
            "chapter": "Limits",
            "animation": {
                "title": "Limits",
                "narration": "n",
                "visual_elements": [{"timestamp": "0:01", "description": "d"}],
                "equations": [],
                "key_timestamps": {"intro": "0:00"},
                "visual_style": "clean"
            }
        });
        let entry: SyllabusEntry = serde_json::from_value(json).unwrap();
        let spec = ArtifactSpec::from_entry("Math", entry);
        assert!(spec.is_refinable());
        let animation = spec.animation.unwrap();
        assert_eq!(animation.key_timestamps["intro"], "0:00");
        assert_eq!(animation.visual_elements.len(), 1);
    }
}
