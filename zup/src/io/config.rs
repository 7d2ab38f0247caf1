//! Tool configuration stored under `.zup/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::mode::DEFAULT_BACKGROUND_LOG;
use super::process::DEFAULT_SHELL;
use super::readiness::{DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};

pub const DEFAULT_CONFIG_PATH: &str = ".zup/config.toml";

/// zup configuration (TOML).
///
/// Missing fields default to the values the tool ships with, so an absent
/// file behaves like an empty one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ZupConfig {
    pub advisor: AdvisorConfig,
    pub execution: ExecutionConfig,
}

/// Fix advisor transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AdvisorConfig {
    pub model: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Credential; when unset the CLI reads `api_key_env` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the credential.
    pub api_key_env: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Interpreter invoked as `<shell> -c <command>`.
    pub shell: String,
    /// Log file receiving output of background-mode commands.
    pub background_log: PathBuf,
    /// Search path checks after a background step's fix succeeds.
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    /// Cap on accepted fixes per step. Unset means no cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fixes: Option<u32>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            background_log: PathBuf::from(DEFAULT_BACKGROUND_LOG),
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval_ms: u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(u64::MAX),
            max_fixes: None,
        }
    }
}

impl ExecutionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ZupConfig {
    pub fn validate(&self) -> Result<()> {
        if self.advisor.model.trim().is_empty() {
            return Err(anyhow!("advisor.model must be non-empty"));
        }
        if self.advisor.base_url.trim().is_empty() {
            return Err(anyhow!("advisor.base_url must be non-empty"));
        }
        if self.advisor.timeout_secs == 0 {
            return Err(anyhow!("advisor.timeout_secs must be > 0"));
        }
        if self.execution.shell.trim().is_empty() {
            return Err(anyhow!("execution.shell must be non-empty"));
        }
        if self.execution.background_log.as_os_str().is_empty() {
            return Err(anyhow!("execution.background_log must be non-empty"));
        }
        if self.execution.poll_attempts == 0 {
            return Err(anyhow!("execution.poll_attempts must be > 0"));
        }
        if self.execution.max_fixes == Some(0) {
            return Err(anyhow!("execution.max_fixes must be > 0 when set"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ZupConfig::default()`.
pub fn load_config(path: &Path) -> Result<ZupConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = ZupConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ZupConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ZupConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
