//! Canonical file locations inside the state directory.

use std::path::PathBuf;

use anyhow::{Context, Result};

const APP_DIR: &str = "docagent";

/// All files owned by docagent for one state directory.
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
    pub settings_path: PathBuf,
}

impl StatePaths {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            config_path: state_dir.join("config.toml"),
            settings_path: state_dir.join("settings.json"),
            state_dir,
        }
    }

    /// Use `explicit` when given, otherwise `<config dir>/docagent`.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        let state_dir = match explicit {
            Some(dir) => dir,
            None => dirs::config_dir()
                .context("no user config directory; pass --state-dir")?
                .join(APP_DIR),
        };
        Ok(Self::new(state_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::resolve(Some(temp.path().to_path_buf())).expect("resolve");
        assert_eq!(paths.config_path, temp.path().join("config.toml"));
        assert_eq!(paths.settings_path, temp.path().join("settings.json"));
    }
}
