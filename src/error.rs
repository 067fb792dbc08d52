//! Errors raised while locating, configuring and reading the serial device.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop the monitor once arguments are parsed
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("no USB serial device found in {} (tried {})", dir.display(), patterns.join(", "))]
    DeviceNotFound { dir: PathBuf, patterns: Vec<String> },

    #[error("failed to list device directory {}", dir.display())]
    Listing {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    // The OS error is part of each message below, so it is not also exposed
    // as the error source.
    #[error("error opening {}: {cause}", path.display())]
    Open { path: PathBuf, cause: io::Error },

    #[error("error getting serial attributes for {}: {cause}", path.display())]
    AttributeRead { path: PathBuf, cause: io::Error },

    #[error("error setting serial attributes for {}: {cause}", path.display())]
    AttributeWrite { path: PathBuf, cause: io::Error },

    #[error("giving up on {} after {failures} consecutive read errors: {cause}", path.display())]
    Read {
        path: PathBuf,
        failures: u32,
        cause: io::Error,
    },

    #[error("failed to write serial data to output: {cause}")]
    Output { cause: io::Error },
}

pub type Result<T> = std::result::Result<T, MonitorError>;
