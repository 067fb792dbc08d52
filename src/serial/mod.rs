//! Serial device access for USB microcontroller boards
//!
//! This module provides functionality for:
//! - Opening the device read-only and switching it to raw 9600 8N1
//! - Streaming received bytes to stdout until interrupted

pub mod monitor;
pub mod port;

pub use monitor::{run_monitor, ReaderConfig};
