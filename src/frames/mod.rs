//! Frame sampling from partial renders.
//!
//! Frame evidence is optional: a sampler never fails, it returns an empty
//! sample when the media is missing or cannot be decoded. The refinement
//! loop only forwards a count summary, never the frame payloads.

mod ffmpeg;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tempfile::TempDir;

pub use ffmpeg::{FfmpegConfig, FfmpegFrameSampler};

/// Default distance between sampled frames
pub const DEFAULT_STRIDE: u32 = 25;

/// A finite, restartable set of still frames
///
/// Frames stay on disk until iterated; each call to `iter` re-reads and
/// base64-encodes them, so the sample can be walked any number of times.
#[derive(Debug, Default)]
pub struct FrameSample {
    files: Vec<PathBuf>,
    // Keeps extracted frames alive as long as the sample
    _workdir: Option<TempDir>,
}

impl FrameSample {
    /// Sample with no frames
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sample backed by existing image files, in order
    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self { files, _workdir: None }
    }

    /// Sample that owns the directory its frames were extracted into
    pub(crate) fn in_workdir(files: Vec<PathBuf>, workdir: TempDir) -> Self {
        Self {
            files,
            _workdir: Some(workdir),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Base64-encoded frames, read lazily; unreadable frames are skipped
    pub fn iter(&self) -> impl Iterator<Item = String> + '_ {
        self.files
            .iter()
            .filter_map(|path| std::fs::read(path).ok())
            .map(|bytes| STANDARD.encode(bytes))
    }

    /// One-line summary handed to the refiner instead of the payloads
    pub fn summary(&self) -> String {
        if self.is_empty() {
            "No frames provided.".to_string()
        } else {
            format!("{} frames provided.", self.len())
        }
    }
}

/// Produces frame samples from a rendered media file
#[async_trait]
pub trait FrameSampler: Send + Sync {
    /// Every `stride`-th frame of `media`; empty if `media` does not exist
    /// or cannot be decoded.
    async fn sample(&self, media: &Path, stride: u32) -> FrameSample;
}

/// Sampler that never finds any frames
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFrames;

#[async_trait]
impl FrameSampler for NoFrames {
    async fn sample(&self, _media: &Path, _stride: u32) -> FrameSample {
        FrameSample::empty()
    }
}
