//! File-backed settings for the Tether CLI.
//!
//! Settings live in a YAML (or JSON) document at
//! `<config_dir>/tether/config.yaml`, overridable with `TETHER_CONFIG_PATH`.
//! A missing file means defaults. A file that exists but cannot be parsed is
//! logged and ignored, so a typo never locks users out of the tool.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::expand_tilde;

/// Environment variable overriding the settings file path.
pub const CONFIG_PATH_ENV: &str = "TETHER_CONFIG_PATH";

/// Default settings file name inside the `tether` config directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Error surfaced when reading settings fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Persisted settings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    /// Page size for collection views whose query declares no limit.
    pub default_page_size: Option<usize>,
    /// Tracing filter used when `RUST_LOG` is not set.
    pub log_filter: Option<String>,
    /// Manifest loaded when none is given on the command line.
    pub manifest: Option<String>,
}

impl TetherConfig {
    /// Loads settings from [`default_config_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_path())
    }

    /// Loads settings from `path`, falling back to defaults when the file is
    /// missing or malformed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(data) => match Self::parse(&data) {
                Ok(config) => {
                    debug!(path = %path.display(), "loaded config");
                    Ok(config)
                }
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "Failed to parse config file; using defaults");
                    Ok(Self::default())
                }
            },
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(ConfigError::Io(error)),
        }
    }

    /// Parses a YAML or JSON settings document.
    pub fn parse(data: &str) -> Result<Self, ConfigError> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(data)?)
    }

    /// Configured manifest path with `~` expanded.
    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.manifest
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(expand_tilde)
    }
}

/// Resolves the settings file path, honouring [`CONFIG_PATH_ENV`].
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tether")
        .join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn env_override_is_used() {
        let override_path = "/tmp/tether-test/config.yaml";
        temp_env::with_var(CONFIG_PATH_ENV, Some(override_path), || {
            assert_eq!(default_config_path(), PathBuf::from(override_path));
        });
    }

    #[test]
    fn blank_override_falls_back_to_config_dir() {
        temp_env::with_var(CONFIG_PATH_ENV, Some("   "), || {
            let path = default_config_path();
            assert!(path.ends_with(Path::new("tether").join(CONFIG_FILE_NAME)));
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().expect("temp dir");
        let config = TetherConfig::load_from(&dir.path().join("absent.yaml")).expect("load");
        assert_eq!(config, TetherConfig::default());
    }

    #[test]
    fn yaml_and_json_documents_parse() {
        let dir = tempdir().expect("temp dir");
        let yaml = dir.path().join("config.yaml");
        fs::write(&yaml, "default_page_size: 5\nlog_filter: debug\nmanifest: ~/views.yaml\n").expect("write yaml");
        let config = TetherConfig::load_from(&yaml).expect("load yaml");
        assert_eq!(config.default_page_size, Some(5));
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
        assert!(config.manifest_path().is_some_and(|path| path.ends_with("views.yaml")));

        let json = dir.path().join("config.json");
        fs::write(&json, r#"{"default_page_size": 3}"#).expect("write json");
        assert_eq!(TetherConfig::load_from(&json).expect("load json").default_page_size, Some(3));
    }

    #[test]
    fn malformed_file_warns_and_uses_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.yaml");
        fs::write(&path, "default_page_size: [not, a, number]").expect("write");
        assert_eq!(TetherConfig::load_from(&path).expect("load"), TetherConfig::default());
        assert!(TetherConfig::parse("default_page_size: [1]").is_err());
    }
}
