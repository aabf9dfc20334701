//! Persisted provider selection and credentials (`settings.json`).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::Provider;
use crate::io::config::write_atomic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: Provider,
    pub api_keys: BTreeMap<Provider, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            api_keys: Provider::ALL
                .into_iter()
                .map(|provider| (provider, String::new()))
                .collect(),
        }
    }
}

/// Load settings; a missing file yields the defaults (Google, no keys).
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!(path = %path.display(), "settings missing, using defaults");
        return Ok(Settings::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut settings: Settings =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    for provider in Provider::ALL {
        settings.api_keys.entry(provider).or_default();
    }
    Ok(settings)
}

/// Atomically write settings (temp file + rename).
pub fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(settings).context("serialize settings")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_defaults_to_google_without_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(&temp.path().join("settings.json")).expect("load");
        assert_eq!(settings.provider, Provider::Google);
        assert_eq!(settings.api_keys.get(&Provider::OpenRouter), Some(&String::new()));
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("settings.json");
        let mut settings = Settings::default();
        settings.provider = Provider::OpenRouter;
        settings
            .api_keys
            .insert(Provider::OpenRouter, "sk-or-1".to_string());
        write_settings(&path, &settings).expect("write");

        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\"provider\": \"openrouter\""));
        assert_eq!(load_settings(&path).expect("load"), settings);
    }

    #[test]
    fn partial_file_fills_missing_providers() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("settings.json");
        fs::write(&path, r#"{"api_keys":{"google":"g-1"}}"#).expect("write");
        let settings = load_settings(&path).expect("load");
        assert_eq!(settings.provider, Provider::Google);
        assert_eq!(settings.api_keys.get(&Provider::Google).map(String::as_str), Some("g-1"));
        assert!(settings.api_keys.contains_key(&Provider::OpenRouter));
    }
}
