//! Serial device discovery
//!
//! This module provides:
//! - Glob-style matching of device names against known USB serial patterns
//! - Resolution of the device to open (user hint or directory search)
//! - Listing of plausible device nodes for diagnostics

pub mod listing;
pub mod resolver;

pub use listing::print_candidates;
pub use resolver::{PortResolver, DEFAULT_DEVICE_DIR, DEFAULT_LISTING_PREFIX, DEFAULT_PATTERNS};
