//! CLI definitions for uiprobe test binaries.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Backend, ConfigError, HarnessConfig};

/// uiprobe harness CLI.
///
/// Parsed by the test binary embedding the harness; the positional
/// argument selects a single story, everything else overrides the
/// configuration file.
#[derive(Debug, Parser)]
#[command(name = "uiprobe")]
#[command(about = "Browser/DOM end-to-end test harness")]
#[command(version)]
pub struct Cli {
    /// Story to run (default: all registered stories)
    pub story: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Execution backend
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Base URL of the application under test
    #[arg(long, env = "UIPROBE_BASE_URL")]
    pub base_url: Option<String>,

    /// DevTools HTTP endpoint of the controlled browser
    #[arg(long, env = "UIPROBE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Directory for failure screenshots
    #[arg(long)]
    pub screenshot_dir: Option<PathBuf>,

    /// Expected number of results, for n/total counters
    #[arg(long)]
    pub expected: Option<u32>,
}

impl Cli {
    /// Effective configuration: the file named by `--config` (defaults
    /// when absent) with command-line overrides applied on top.
    pub fn resolve(&self) -> Result<HarnessConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::load(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(backend) = self.backend {
            config.target.backend = backend;
        }
        if let Some(base_url) = &self.base_url {
            config.target.base_url = base_url.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.target.endpoint = endpoint.clone();
        }
        if let Some(dir) = &self.screenshot_dir {
            config.report.screenshot_dir = Some(dir.clone());
        }
        if let Some(expected) = self.expected {
            config.report.expected = expected;
        }

        Ok(config)
    }
}
