//! Decoding upstream syllabus job results into artifact specs.

use log::{debug, info};
use serde_json::Value;

use crate::codegen::ScriptWriter;
use crate::domain::{ArtifactSpec, SyllabusEntry};
use crate::error::{RenderError, Result};

/// Syllabus entries in an upstream result, accepting either a bare array
/// or the `{"data": [...]}` envelope the syllabus stage produces.
pub fn syllabus_entries(value: &Value) -> Result<Vec<SyllabusEntry>> {
    let entries = match value {
        Value::Array(_) => value,
        Value::Object(map) => map
            .get("data")
            .ok_or_else(|| RenderError::InvalidState("syllabus result has no data field".to_string()))?,
        other => {
            return Err(RenderError::InvalidState(format!(
                "syllabus result must be an array or an object, got {}",
                kind(other)
            )));
        }
    };

    if !entries.is_array() {
        return Err(RenderError::InvalidState(format!(
            "syllabus data must be an array, got {}",
            kind(entries)
        )));
    }

    serde_json::from_value(entries.clone())
        .map_err(|e| RenderError::InvalidState(format!("malformed syllabus entry: {}", e)))
}

/// Artifact specs for every chapter of an upstream syllabus result
pub fn specs_from_syllabus(subject: &str, value: &Value) -> Result<Vec<ArtifactSpec>> {
    Ok(syllabus_entries(value)?
        .into_iter()
        .map(|entry| ArtifactSpec::from_entry(subject, entry))
        .collect())
}

/// Give every entry without an animation script one written by `writer`.
///
/// Entries run one at a time, in order; entries that already carry a script
/// are kept as they are. The first writer error stops the stage.
pub async fn fill_missing_scripts<W>(writer: &W, subject: &str, mut entries: Vec<SyllabusEntry>) -> Result<Vec<SyllabusEntry>>
where
    W: ScriptWriter + ?Sized,
{
    let mut written = 0;
    for entry in entries.iter_mut().filter(|e| e.animation.is_none()) {
        debug!("Scripting chapter {}", entry.chapter);
        entry.animation = Some(writer.write_script(subject, entry).await?);
        written += 1;
    }
    info!("Wrote {} animation script(s) for {} chapters", written, entries.len());
    Ok(entries)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
