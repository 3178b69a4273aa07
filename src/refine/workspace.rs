//! Where candidate artifacts are persisted.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;

use crate::domain::ArtifactSpec;
use crate::error::Result;
use crate::id::artifact_timestamp;

/// Output directory for persisted candidates
#[derive(Debug, Clone)]
pub struct ArtifactWorkspace {
    output_dir: PathBuf,
}

impl ArtifactWorkspace {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Claim a fresh path for a new run of `spec`:
    /// `{output_dir}/{chapter_stem}_manim_{YYYYmmdd_HHMMSS}.py`.
    ///
    /// The file is created empty with `create_new`, so concurrent runs never
    /// share a path. When the name is taken a `_N` suffix is appended.
    pub fn reserve(&self, spec: &ArtifactSpec) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let base = format!("{}_manim_{}", spec.artifact_stem(), artifact_timestamp());

        let mut n = 0u32;
        loop {
            let name = match n {
                0 => format!("{}.py", base),
                n => format!("{}_{}.py", base, n),
            };
            let path = self.output_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Write `code` to `path`, replacing any earlier candidate
    pub fn persist(&self, path: &Path, code: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, code)?;
        debug!("Persisted {} bytes to {}", code.len(), path.display());
        Ok(())
    }
}
