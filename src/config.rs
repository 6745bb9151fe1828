//! Configuration loaded from `~/.config/chatshare/config.toml`.
//!
//! ```toml
//! [extraction]
//! browser_timeout_ms = 20000
//! retries = 3
//! include_attachments = true
//!
//! [browser]
//! executable = "/usr/bin/chromium"
//! extra_args = ["--lang=en-US"]
//! ```
//!
//! Every key is optional; a missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::browser::LaunchOptions;
use crate::conversation::ExtractionMethod;
use crate::site::ExtractOptions;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub browser: BrowserConfig,
}

/// `[extraction]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    pub browser_timeout_ms: u64,
    pub http_timeout_ms: u64,
    pub retries: u32,
    pub backoff_ms: u64,
    pub max_messages: usize,
    pub include_artifacts: bool,
    pub include_attachments: bool,
    /// Replaces every platform's post-render settle delay.
    pub settle_ms: Option<u64>,
    pub method: Option<ExtractionMethod>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self::from(&ExtractOptions::default())
    }
}

impl From<&ExtractOptions> for ExtractionConfig {
    fn from(options: &ExtractOptions) -> Self {
        Self {
            browser_timeout_ms: millis(options.browser_timeout),
            http_timeout_ms: millis(options.http_timeout),
            retries: options.retries,
            backoff_ms: millis(options.backoff_step),
            max_messages: options.max_messages,
            include_artifacts: options.include_artifacts,
            include_attachments: options.include_attachments,
            settle_ms: options.settle.map(millis),
            method: options.method,
        }
    }
}

/// `[browser]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    /// Chrome/Chromium binary; auto-detected when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub extra_args: Vec<String>,
    pub launch_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        let launch = LaunchOptions::default();
        Self {
            executable: launch.executable,
            headless: launch.headless,
            extra_args: launch.extra_args,
            launch_timeout_ms: millis(launch.launch_timeout),
        }
    }
}

impl Config {
    /// Load from the default location.
    ///
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path`, with defaults when it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    #[must_use]
    pub fn extract_options(&self) -> ExtractOptions {
        let e = &self.extraction;
        ExtractOptions {
            browser_timeout: Duration::from_millis(e.browser_timeout_ms),
            http_timeout: Duration::from_millis(e.http_timeout_ms),
            retries: e.retries,
            backoff_step: Duration::from_millis(e.backoff_ms),
            max_messages: e.max_messages,
            include_artifacts: e.include_artifacts,
            include_attachments: e.include_attachments,
            settle: e.settle_ms.map(Duration::from_millis),
            method: e.method,
        }
    }

    #[must_use]
    pub fn launch_options(&self) -> LaunchOptions {
        let b = &self.browser;
        LaunchOptions {
            executable: b.executable.clone(),
            headless: b.headless,
            extra_args: b.extra_args.clone(),
            launch_timeout: Duration::from_millis(b.launch_timeout_ms),
        }
    }
}

/// Return the path to the config file.
#[must_use]
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatshare")
        .join("config.toml")
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
