//! Harness configuration file.
//!
//! A small TOML file selects the backend, the application under test
//! and the reporting options; every field has a default so an empty
//! file (or no file at all) is a valid configuration.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Execution backend for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process document backend.
    Dom,
    /// Remote-controlled browser over the DevTools protocol.
    #[default]
    Cdp,
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// Where and how the tests execute.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Base URL of the application under test.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// DevTools HTTP endpoint of the controlled browser.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            base_url: default_base_url(),
            endpoint: default_endpoint(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/".to_string()
}

fn default_endpoint() -> String {
    "http://127.0.0.1:9222".to_string()
}

/// Reporting options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    /// Directory for failure screenshots. Unset disables capture.
    #[serde(default)]
    pub screenshot_dir: Option<PathBuf>,

    /// Expected number of results, for `12/340`-style counters. Zero
    /// when unknown.
    #[serde(default)]
    pub expected: u32,
}

impl HarnessConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Self, ConfigError> {
        let config = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_config_uses_defaults() {
        let config = HarnessConfig::load_str("").unwrap();
        assert_eq!(config.target.backend, Backend::Cdp);
        assert_eq!(config.target.base_url, "http://127.0.0.1:8080/");
        assert_eq!(config.target.endpoint, "http://127.0.0.1:9222");
        assert_eq!(config.report.expected, 0);
        assert!(config.report.screenshot_dir.is_none());
    }

    #[test]
    fn fields_override_defaults() {
        let content = r#"
            [target]
            backend = "dom"
            base_url = "http://app.test/"

            [report]
            screenshot_dir = "artifacts"
            expected = 340
        "#;
        let config = HarnessConfig::load_str(content).unwrap();
        assert_eq!(config.target.backend, Backend::Dom);
        assert_eq!(config.target.base_url, "http://app.test/");
        assert_eq!(
            config.report.screenshot_dir,
            Some(PathBuf::from("artifacts"))
        );
        assert_eq!(config.report.expected, 340);
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[target]\nbackend = \"dom\"\n").unwrap();

        let config = HarnessConfig::load(file.path()).unwrap();
        assert_eq!(config.target.backend, Backend::Dom);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = HarnessConfig::load_str("[target").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
