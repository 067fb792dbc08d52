//! Interrupt handling
//!
//! Ctrl+C (and SIGTERM/SIGHUP) only flips a shared flag; the reader checks
//! it once per wait interval and shuts down on its own.

use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag shared between the signal handler and the reader
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    stopped: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Stop the reader and tell the user on stderr; stdout carries device bytes only
pub fn interrupt(flag: &StopFlag) {
    flag.stop();
    eprintln!("\n{}", "Stopping monitor...".yellow());
}

/// Set `flag` when the process is interrupted
pub fn install_handler(flag: StopFlag) -> Result<()> {
    ctrlc::set_handler(move || interrupt(&flag)).with_context(|| "Failed to set Ctrl+C handler")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_flag_is_shared() {
        let flag = StopFlag::new();
        let handler_copy = flag.clone();
        assert!(!flag.is_stopped());

        handler_copy.stop();
        assert!(flag.is_stopped());
        assert!(handler_copy.is_stopped());
    }

    #[test]
    fn test_interrupt_sets_flag() {
        let flag = StopFlag::new();
        interrupt(&flag.clone());
        assert!(flag.is_stopped());
    }
}
