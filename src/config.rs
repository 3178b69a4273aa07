use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::frames::{DEFAULT_STRIDE, FfmpegConfig};
use crate::llm::AnthropicConfig;
use crate::sandbox::SandboxConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub sandbox: SandboxSection,
    pub frames: FramesConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub api_key_env: String,
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let anthropic = AnthropicConfig::default();
        Self {
            model: anthropic.model,
            max_tokens: anthropic.max_tokens,
            timeout_ms: anthropic.timeout.as_millis() as u64,
            api_key_env: anthropic.api_key_env,
            base_url: anthropic.base_url,
        }
    }
}

impl LlmConfig {
    pub fn anthropic(&self) -> AnthropicConfig {
        AnthropicConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            timeout: Duration::from_millis(self.timeout_ms),
            base_url: self.base_url.clone(),
            api_key_env: self.api_key_env.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    pub program: String,
    pub args: Vec<String>,
    /// Render quality directory; derived from the `-q` flag in `args` when unset
    pub quality: Option<String>,
    pub timeout_ms: u64,
}

impl Default for SandboxSection {
    fn default() -> Self {
        let sandbox = SandboxConfig::default();
        Self {
            program: sandbox.program,
            args: sandbox.args,
            quality: sandbox.quality,
            timeout_ms: sandbox.timeout_ms,
        }
    }
}

impl SandboxSection {
    pub fn sandbox(&self) -> SandboxConfig {
        let config = SandboxConfig::new(self.program.clone())
            .args(self.args.clone())
            .timeout_ms(self.timeout_ms);
        match &self.quality {
            Some(quality) => config.quality(quality.clone()),
            None => config,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FramesConfig {
    pub program: String,
    pub stride: u32,
    pub timeout_ms: u64,
}

impl Default for FramesConfig {
    fn default() -> Self {
        let ffmpeg = FfmpegConfig::default();
        Self {
            program: ffmpeg.program,
            stride: DEFAULT_STRIDE,
            timeout_ms: ffmpeg.timeout_ms,
        }
    }
}

impl FramesConfig {
    pub fn ffmpeg(&self) -> FfmpegConfig {
        FfmpegConfig {
            program: self.program.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub max_iterations: u32,
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("scenes"),
            max_iterations: 3,
            workers: crate::dispatch::DEFAULT_WORKERS,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. renderloop.yml in current directory
    /// 3. ~/.config/renderloop/renderloop.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from("renderloop.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from renderloop.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load renderloop.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("renderloop").join("renderloop.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.max_iterations == 0 {
            eyre::bail!("pipeline.max_iterations must be > 0");
        }
        if self.pipeline.workers == 0 {
            eyre::bail!("pipeline.workers must be > 0");
        }
        if self.frames.stride == 0 {
            eyre::bail!("frames.stride must be > 0");
        }
        if self.sandbox.program.trim().is_empty() {
            eyre::bail!("sandbox.program must not be empty");
        }
        if self.sandbox.sandbox().render_quality().is_none() {
            eyre::bail!(
                "sandbox.args {:?} use an unknown -q value; set sandbox.quality to the render directory",
                self.sandbox.args
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.max_iterations, 3);
        assert_eq!(config.pipeline.workers, 4);
        assert_eq!(config.pipeline.output_dir, PathBuf::from("scenes"));
        assert_eq!(config.sandbox.program, "manim");
        assert_eq!(config.sandbox.args, vec!["-qh"]);
        assert!(config.sandbox.quality.is_none());
        assert_eq!(config.sandbox.sandbox().render_quality().as_deref(), Some("1080p60"));
        assert_eq!(config.sandbox.timeout_ms, 600_000);
        assert_eq!(config.frames.stride, DEFAULT_STRIDE);
        assert_eq!(config.llm.api_key_env, "ANTHROPIC_API_KEY");
        assert!(config.log_level.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
log_level: debug
pipeline:
  max_iterations: 5
sandbox:
  timeout_ms: 1000
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.pipeline.max_iterations, 5);
        assert_eq!(config.pipeline.workers, 4);
        assert_eq!(config.sandbox.timeout_ms, 1000);
        assert_eq!(config.sandbox.program, "manim");
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.yml");
        fs::write(&path, "frames:\n  stride: 10\nllm:\n  model: claude-3-haiku-20240307\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.frames.stride, 10);
        assert_eq!(config.llm.model, "claude-3-haiku-20240307");
        assert_eq!(config.llm.anthropic().model, "claude-3-haiku-20240307");
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/renderloop.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_invalid_yaml_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yml");
        fs::write(&path, "pipeline: [not, a, map]").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.pipeline.max_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pipeline.workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.frames.stride = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_checks_render_quality() {
        let yaml = "sandbox:\n  args: [\"-ql\"]\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.sandbox.sandbox().render_quality().as_deref(), Some("480p15"));

        let mut config = Config::default();
        config.sandbox.args = vec!["-qx".to_string()];
        assert!(config.validate().is_err());

        config.sandbox.quality = Some("custom".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_section_conversions() {
        let config = Config::default();
        let sandbox = config.sandbox.sandbox();
        assert_eq!(sandbox.program, "manim");
        assert_eq!(sandbox.timeout_ms, 600_000);

        let anthropic = config.llm.anthropic();
        assert_eq!(anthropic.timeout, Duration::from_secs(300));

        let ffmpeg = config.frames.ffmpeg();
        assert_eq!(ffmpeg.program, "ffmpeg");
    }
}
