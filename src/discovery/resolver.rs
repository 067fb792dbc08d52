//! USB serial port resolution
//!
//! Picks the device node to monitor: either the path the user gave, or the
//! first node in the device directory matching a known USB serial name.

use super::listing::device_names;
use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use colored::Colorize;
use log::debug;
use std::path::{Path, PathBuf};

/// Directory holding device nodes
pub const DEFAULT_DEVICE_DIR: &str = "/dev";

/// USB serial name patterns, most common driver family first
#[cfg(target_os = "macos")]
pub const DEFAULT_PATTERNS: &[&str] = &[
    "cu.usbmodem*",       // CDC-ACM (Arduino Uno R3, Leonardo, Due)
    "cu.usbserial*",      // FTDI and generic adapters
    "cu.wchusbserial*",   // WCH CH340/CH341 clones
    "cu.SLAB_USBtoUART*", // Silicon Labs CP210x
];

/// USB serial name patterns, most common driver family first
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_PATTERNS: &[&str] = &[
    "ttyACM*",      // CDC-ACM (Arduino Uno R3, Leonardo, Due)
    "ttyUSB*",      // FTDI, CH340, CP210x, PL2303 via usb-serial
    "ttyCH341USB*", // WCH vendor driver
    "ttySLAB*",     // Silicon Labs vendor driver
];

/// Names starting with this prefix are shown when nothing matched
#[cfg(target_os = "macos")]
pub const DEFAULT_LISTING_PREFIX: &str = "cu.";

/// Names starting with this prefix are shown when nothing matched
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_LISTING_PREFIX: &str = "tty";

/// Match a file name against a shell-style pattern (`*` and `?` only)
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    let name: Vec<char> = name.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut n, mut p) = (0, 0);
    // position of the last `*` and the name index it is currently covering up to
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            n += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, n));
            p += 1;
        } else if let Some((star, covered)) = backtrack {
            p = star + 1;
            n = covered + 1;
            backtrack = Some((star, covered + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// First name matching the highest-priority pattern that matches anything.
///
/// Within a pattern the lexicographically smallest name wins, regardless of
/// the order of `names`.
pub fn first_match<'a, S: AsRef<str>>(names: &'a [String], patterns: &[S]) -> Option<&'a str> {
    patterns.iter().find_map(|pattern| {
        let pattern = pattern.as_ref();
        let found = names
            .iter()
            .map(String::as_str)
            .filter(|name| matches_pattern(name, pattern))
            .min();
        debug!(
            "pattern {:?}: {}",
            pattern,
            found.unwrap_or("no match")
        );
        found
    })
}

/// Locates the serial device to open
#[derive(Debug, Clone)]
pub struct PortResolver {
    device_dir: PathBuf,
    patterns: Vec<String>,
}

impl PortResolver {
    /// Create a resolver over `device_dir` with patterns in priority order
    pub fn new(device_dir: impl Into<PathBuf>, patterns: Vec<String>) -> Self {
        Self {
            device_dir: device_dir.into(),
            patterns,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.device_dir.clone(), config.patterns.clone())
    }

    /// Resolve the device path.
    ///
    /// A hint is taken as-is without searching; it is checked only when the
    /// reader opens it.
    pub fn resolve(&self, hint: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = hint {
            println!(
                "{} Using requested port: {}",
                "[*]".cyan().bold(),
                path.display().to_string().white()
            );
            return Ok(path.to_path_buf());
        }

        println!(
            "{} Searching for USB serial ports in {}...",
            "[*]".cyan().bold(),
            self.device_dir.display()
        );

        let path = self.search()?;
        println!(
            "{} Found USB serial port: {}",
            "[OK]".green().bold(),
            path.display().to_string().white().bold()
        );
        Ok(path)
    }

    /// Search the device directory without printing progress
    pub fn search(&self) -> Result<PathBuf> {
        let names = device_names(&self.device_dir)?;
        debug!("{} entries in {}", names.len(), self.device_dir.display());

        first_match(&names, &self.patterns)
            .map(|name| self.device_dir.join(name))
            .ok_or_else(|| MonitorError::DeviceNotFound {
                dir: self.device_dir.clone(),
                patterns: self.patterns.clone(),
            })
    }
}
