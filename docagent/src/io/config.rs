//! Agent configuration stored as `config.toml` in the state directory.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Agent configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to the
/// values the hosted providers expect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DocAgentConfig {
    /// Pause between an update that asks to continue and the next cycle.
    pub continuation_delay_ms: u64,

    /// Number of trailing chat messages sent as conversation context.
    pub history_window: usize,

    /// Whole-request timeout for one streamed model call, in seconds.
    pub request_timeout_secs: u64,

    pub gemini: GeminiConfig,
    pub openrouter: OpenRouterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeminiConfig {
    pub model: String,
    /// Models collection URL; `/{model}:streamGenerateContent` is appended.
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OpenRouterConfig {
    pub model: String,
    pub endpoint: String,
    /// Sent as `HTTP-Referer`.
    pub referer: String,
    /// Sent as `X-Title`.
    pub title: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            model: "google/gemini-flash-1.5".to_string(),
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            referer: "http://localhost:8787".to_string(),
            title: "docagent".to_string(),
        }
    }
}

impl Default for DocAgentConfig {
    fn default() -> Self {
        Self {
            continuation_delay_ms: 2_500,
            history_window: 6,
            request_timeout_secs: 120,
            gemini: GeminiConfig::default(),
            openrouter: OpenRouterConfig::default(),
        }
    }
}

impl DocAgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.continuation_delay_ms == 0 {
            return Err(anyhow!("continuation_delay_ms must be > 0"));
        }
        if self.history_window == 0 {
            return Err(anyhow!("history_window must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be > 0"));
        }
        if self.gemini.model.trim().is_empty() || self.gemini.base_url.trim().is_empty() {
            return Err(anyhow!("gemini.model and gemini.base_url must be non-empty"));
        }
        if self.openrouter.model.trim().is_empty() || self.openrouter.endpoint.trim().is_empty() {
            return Err(anyhow!(
                "openrouter.model and openrouter.endpoint must be non-empty"
            ));
        }
        Ok(())
    }

    pub fn continuation_delay(&self) -> Duration {
        Duration::from_millis(self.continuation_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DocAgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<DocAgentConfig> {
    if !path.exists() {
        let cfg = DocAgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DocAgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &DocAgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write `contents` next to `path` and rename it into place.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
