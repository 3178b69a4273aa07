//! Prompt text for animation scripts, scene generation and repair.

use std::fmt::Write;

use serde_json::Value;

use crate::domain::{AnimationScript, ArtifactSpec, SyllabusEntry};

use super::RefinementRequest;

pub const GENERATION_SYSTEM: &str = "You write short (30-60 second) Manim Community v0.18+ scenes \
that explain one concept with simple, clean visuals. Reply with a single complete Python script \
inside a ```python fenced block. The script imports only `from manim import *`, defines one class \
inheriting from `Scene`, uses 2-3 sequential animations built from current APIs (Write, Create, \
FadeIn, Transform), renders at most two MathTex equations and never uses deprecated names such as \
ShowCreation.";

pub const REFINEMENT_SYSTEM: &str = "You repair Manim Community v0.18+ scripts. Given a script that \
was executed, its logs and its errors, return a corrected version of the whole script that fixes \
the failure. Reply with the complete script inside a ```python fenced block.";

pub const SCRIPT_SYSTEM: &str = "You write 2-3 minute animation scripts for mathematical explainer \
videos in the style of 3Blue1Brown. Reply with one JSON object inside a ```json fenced block with \
the keys `title` (the topic), `narration` (the full narration for 2-3 minutes of speech), \
`visual_elements` (a list of objects with `timestamp` such as \"00:10\" and a short visual cue as \
`description`), `equations` (a list of equations shown on screen), `key_timestamps` (an object \
mapping labeled transitions such as \"Intro\" to timestamps) and `visual_style` (a short \
description of the artistic tone).";

/// User prompt for writing the animation script of a syllabus chapter
pub fn script_prompt(subject: &str, entry: &SyllabusEntry) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Subject: {}", subject);
    let _ = writeln!(prompt, "Topic: {}", entry.chapter);

    if let Some(Value::String(insight)) = entry.extra.get("explanation") {
        let _ = writeln!(prompt, "Insight: {}", insight);
    }

    if let Some(Value::Array(concepts)) = entry.extra.get("content") {
        let _ = writeln!(prompt, "Key concepts:");
        for concept in concepts.iter().filter_map(Value::as_str) {
            let _ = writeln!(prompt, "- {}", concept);
        }
    }

    prompt
}

/// User prompt for the first candidate of a chapter
pub fn generation_prompt(spec: &ArtifactSpec) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Subject: {}", spec.subject);
    let _ = writeln!(prompt, "Topic: {}", spec.chapter);

    if let Some(script) = &spec.animation {
        write_script(&mut prompt, script);
    }

    prompt
}

fn write_script(prompt: &mut String, script: &AnimationScript) {
    let _ = writeln!(prompt, "Title: {}", script.title);
    let _ = writeln!(prompt, "Narration: {}", script.narration);

    if !script.visual_elements.is_empty() {
        let _ = writeln!(prompt, "Visual elements:");
        for element in &script.visual_elements {
            let _ = writeln!(prompt, "- {}: {}", element.timestamp, element.description);
        }
    }

    if !script.equations.is_empty() {
        let _ = writeln!(prompt, "Equations:");
        for equation in &script.equations {
            let _ = writeln!(prompt, "- {}", equation);
        }
    }

    if !script.key_timestamps.is_empty() {
        let _ = writeln!(prompt, "Key timestamps:");
        for (label, at) in &script.key_timestamps {
            let _ = writeln!(prompt, "- {}: {}", label, at);
        }
    }

    if !script.visual_style.is_empty() {
        let _ = writeln!(prompt, "Visual style: {}", script.visual_style);
    }
}

/// User prompt for repairing a failed candidate
pub fn refinement_prompt(request: &RefinementRequest) -> String {
    format!(
        "Executed code:\n```python\n{}\n```\n\nLogs:\n{}\n\nErrors:\n{}\n\nFrames: {}\n",
        request.code,
        or_none(&request.stdout),
        or_none(&request.stderr),
        request.frame_summary
    )
}

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() { "(none)" } else { text }
}
