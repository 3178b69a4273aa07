//! Frame sampler that extracts JPEG stills with ffmpeg.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, warn};
use tempfile::TempDir;
use tokio::process::Command;

use super::{FrameSample, FrameSampler};
use crate::sandbox::find_program;

/// Configuration for the ffmpeg sampler
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub program: String,
    pub timeout_ms: u64,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            timeout_ms: 120_000,
        }
    }
}

/// Samples frames by asking ffmpeg for every Nth frame
pub struct FfmpegFrameSampler {
    config: FfmpegConfig,
}

impl FfmpegFrameSampler {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    async fn extract(&self, program: &Path, media: &Path, stride: u32) -> eyre::Result<FrameSample> {
        let workdir = TempDir::new()?;
        let pattern = workdir.path().join("frame_%05d.jpg");
        let filter = format!("select=not(mod(n\\,{}))", stride.max(1));

        let child = Command::new(program)
            .args(["-v", "error", "-i"])
            .arg(media)
            .args(["-vf", filter.as_str(), "-vsync", "vfr", "-q:v", "2"])
            .arg(&pattern)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let timeout = tokio::time::Duration::from_millis(self.config.timeout_ms);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| eyre::eyre!("ffmpeg timed out after {}ms", self.config.timeout_ms))??;

        if !output.status.success() {
            eyre::bail!(
                "ffmpeg exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(workdir.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "jpg"))
            .collect();
        files.sort();

        Ok(FrameSample::in_workdir(files, workdir))
    }
}

impl Default for FfmpegFrameSampler {
    fn default() -> Self {
        Self::new(FfmpegConfig::default())
    }
}

#[async_trait]
impl FrameSampler for FfmpegFrameSampler {
    async fn sample(&self, media: &Path, stride: u32) -> FrameSample {
        if !media.exists() {
            debug!("No render at {}, skipping frame sampling", media.display());
            return FrameSample::empty();
        }
        let Some(program) = find_program(&self.config.program) else {
            warn!("{} not found, skipping frame sampling", self.config.program);
            return FrameSample::empty();
        };

        match self.extract(&program, media, stride).await {
            Ok(sample) => {
                debug!("Sampled {} frames from {}", sample.len(), media.display());
                sample
            }
            Err(e) => {
                warn!("Frame sampling failed for {}: {}", media.display(), e);
                FrameSample::empty()
            }
        }
    }
}
