//! Monitor configuration
//!
//! Built-in defaults can be overridden by a TOML file and then by CLI flags.
//! Line settings (9600 8N1, raw) are fixed and not part of this file.

use crate::discovery::{DEFAULT_DEVICE_DIR, DEFAULT_LISTING_PREFIX, DEFAULT_PATTERNS};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default wait for readability per loop iteration
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 1000;

/// Consecutive read failures tolerated before giving up on the device
pub const DEFAULT_MAX_READ_ERRORS: u32 = 10;

/// Resolved monitor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Directory searched for device nodes
    pub device_dir: PathBuf,
    /// Name patterns in priority order
    pub patterns: Vec<String>,
    /// Prefix of names shown in the diagnostic listing
    pub listing_prefix: String,
    /// Wait for readability per loop iteration
    pub poll_timeout: Duration,
    /// Consecutive read failures tolerated before giving up
    pub max_read_errors: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device_dir: PathBuf::from(DEFAULT_DEVICE_DIR),
            patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            listing_prefix: DEFAULT_LISTING_PREFIX.to_string(),
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            max_read_errors: DEFAULT_MAX_READ_ERRORS,
        }
    }
}

/// On-disk form; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    device_dir: Option<PathBuf>,
    patterns: Option<Vec<String>>,
    listing_prefix: Option<String>,
    poll_timeout_ms: Option<u64>,
    max_read_errors: Option<u32>,
}

impl MonitorConfig {
    /// Load a TOML config file on top of the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse TOML content on top of the defaults
    pub fn parse(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(dir) = file.device_dir {
            config.device_dir = dir;
        }
        if let Some(patterns) = file.patterns {
            config.patterns = patterns;
        }
        if let Some(prefix) = file.listing_prefix {
            config.listing_prefix = prefix;
        }
        if let Some(ms) = file.poll_timeout_ms {
            config.poll_timeout = Duration::from_millis(ms);
        }
        if let Some(max) = file.max_read_errors {
            config.max_read_errors = max;
        }

        config.validate()?;
        Ok(config)
    }

    /// Override the device directory
    pub fn with_device_dir(mut self, dir: PathBuf) -> Self {
        self.device_dir = dir;
        self
    }

    /// Override the per-iteration wait
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Reject values the reader cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.patterns.is_empty() {
            anyhow::bail!("patterns must not be empty");
        }
        if let Some(p) = self.patterns.iter().find(|p| p.is_empty()) {
            anyhow::bail!("invalid empty pattern {:?}", p);
        }
        if self.poll_timeout.is_zero() {
            anyhow::bail!("poll_timeout_ms must be greater than zero");
        }
        if self.poll_timeout.as_millis() > i32::MAX as u128 {
            anyhow::bail!("poll_timeout_ms is too large");
        }
        if self.max_read_errors == 0 {
            anyhow::bail!("max_read_errors must be greater than zero");
        }
        Ok(())
    }
}
