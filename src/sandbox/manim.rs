//! Sandbox that renders scripts with the `manim` CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command;

use super::{ExecutionOutput, ExecutionSandbox, TIMED_OUT_EXIT};
use crate::error::{RenderError, Result};

/// Quality directory manim uses when no `-q` flag is given
pub const DEFAULT_QUALITY: &str = "1080p60";

/// Configuration for the manim sandbox
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Program to run; looked up on `PATH` unless it contains a `/`
    pub program: String,
    /// Arguments placed before the script file name
    pub args: Vec<String>,
    /// Render quality directory override; derived from the `-q` flag when unset
    pub quality: Option<String>,
    /// Wall-clock cap per execution in milliseconds
    pub timeout_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            program: "manim".to_string(),
            args: vec!["-qh".to_string()],
            quality: None,
            timeout_ms: 600_000,
        }
    }
}

impl SandboxConfig {
    /// Create a config for the given program with default settings
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Replace the argument list
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Override the render quality directory
    pub fn quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    /// Set the timeout in milliseconds
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Directory name manim renders into, e.g. `480p15` for `-ql`.
    ///
    /// `None` when `args` carry a quality value manim's layout is unknown for.
    pub fn render_quality(&self) -> Option<String> {
        if let Some(quality) = &self.quality {
            return Some(quality.clone());
        }
        match quality_flag(&self.args) {
            Some(value) => quality_dir(value).map(str::to_string),
            None => Some(DEFAULT_QUALITY.to_string()),
        }
    }
}

/// Value of the last `-q` / `--quality` flag, including clusters like `-pql`
fn quality_flag(args: &[String]) -> Option<&str> {
    let mut value = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let arg = arg.as_str();
        let found = if arg == "--quality" {
            iter.next().map(String::as_str)
        } else if let Some(rest) = arg.strip_prefix("--quality=") {
            Some(rest)
        } else if let Some(cluster) = arg.strip_prefix('-').filter(|a| !a.starts_with('-')) {
            match cluster.find('q') {
                Some(i) if i + 1 < cluster.len() => Some(&cluster[i + 1..]),
                Some(_) => iter.next().map(String::as_str),
                None => None,
            }
        } else {
            None
        };
        if found.is_some() {
            value = found;
        }
    }
    value
}

fn quality_dir(value: &str) -> Option<&'static str> {
    match value {
        "l" => Some("480p15"),
        "m" => Some("720p30"),
        "h" => Some("1080p60"),
        "p" => Some("1440p60"),
        "k" => Some("2160p60"),
        _ => None,
    }
}

/// Executes scripts with manim, in the script's own directory
pub struct ManimSandbox {
    config: SandboxConfig,
}

impl ManimSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    async fn run(&self, program: &Path, artifact: &Path) -> std::io::Result<std::process::Output> {
        let dir = artifact.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let file = artifact.file_name().unwrap_or(artifact.as_os_str());

        let mut cmd = Command::new(program);
        cmd.args(&self.config.args)
            .arg(file)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {} {:?} {:?} in {}", program.display(), self.config.args, file, dir.display());
        let child = cmd.spawn()?;

        let timeout = tokio::time::Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("Execution timed out after {}ms", self.config.timeout_ms),
            )),
        }
    }
}

#[async_trait]
impl ExecutionSandbox for ManimSandbox {
    async fn execute(&self, artifact: &Path) -> Result<ExecutionOutput> {
        let Some(program) = find_program(&self.config.program) else {
            return Ok(ExecutionOutput::tool_unavailable(format!(
                "{} not found in current environment",
                self.config.program
            )));
        };

        match self.run(&program, artifact).await {
            Ok(output) => Ok(ExecutionOutput::new(
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
                // None means the process was killed by a signal
                output.status.code().unwrap_or(1),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                warn!("{} on {}", e, artifact.display());
                Ok(ExecutionOutput::failure(e.to_string(), TIMED_OUT_EXIT))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RenderError::SandboxUnavailable(format!(
                "failed to launch {}: {}",
                program.display(),
                e
            ))),
            Err(e) => Err(RenderError::Io(e)),
        }
    }

    fn media_path(&self, artifact: &Path) -> Option<PathBuf> {
        let stem = artifact.file_stem()?.to_string_lossy().to_string();
        let quality = self.config.render_quality()?;
        let dir = artifact.parent().unwrap_or(Path::new(""));
        Some(
            dir.join("media")
                .join("videos")
                .join(&stem)
                .join(quality)
                .join(format!("{}.mp4", stem)),
        )
    }

    fn description(&self) -> &str {
        &self.config.program
    }
}

/// Resolve a program name the way a shell would
pub fn find_program(name: &str) -> Option<PathBuf> {
    if name.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(name);
        return path.is_file().then_some(path);
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
