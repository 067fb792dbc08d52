//! Serial Monitor
//!
//! Finds the USB serial port of an attached microcontroller board (Arduino,
//! ESP32 dev kits, anything behind a CDC-ACM/FTDI/CH340/CP210x bridge), opens
//! it at 9600 8N1 in raw mode and copies everything it sends to stdout.
//!
//! # Usage
//!
//! ```bash
//! # Auto-detect the board and stream its output
//! serial-monitor
//!
//! # Use a specific device
//! serial-monitor /dev/ttyACM0
//!
//! # Show candidate device nodes
//! serial-monitor --list
//!
//! # Search another directory with custom patterns
//! serial-monitor --config monitor.toml
//! ```

#[cfg(not(unix))]
compile_error!("serial-monitor needs termios and poll(2) and only builds on Unix");

mod config;
mod discovery;
mod error;
mod serial;
mod shutdown;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use config::MonitorConfig;
use discovery::{print_candidates, PortResolver};
use error::MonitorError;
use serial::{run_monitor, ReaderConfig};
use shutdown::StopFlag;

/// Serial Monitor
///
/// Streams the output of a USB serial microcontroller board to stdout
#[derive(Parser, Debug)]
#[command(name = "serial-monitor")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Stream output from a USB serial microcontroller board to stdout")]
struct Cli {
    /// Serial device path (e.g., /dev/ttyACM0); auto-detected when omitted
    device: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory searched for device nodes (overrides config)
    #[arg(long)]
    dev_dir: Option<PathBuf>,

    /// Wait for data per loop iteration in milliseconds (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=i32::MAX as u64))]
    poll_ms: Option<u64>,

    /// List candidate device nodes and exit
    #[arg(short, long)]
    list: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // usage errors exit 1; --help and --version exit 0
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = build_config(&cli)?;

    if cli.list {
        return handle_list(&config);
    }

    let resolver = PortResolver::from_config(&config);
    let port_path = match resolver.resolve(cli.device.as_deref()) {
        Ok(path) => path,
        Err(err @ MonitorError::DeviceNotFound { .. }) => {
            println!(
                "{} No USB serial port found automatically",
                "[ERROR]".red().bold()
            );
            print_candidates(&config.device_dir, &config.listing_prefix)?;
            #[cfg(feature = "serial")]
            discovery::listing::print_usb_ports()?;
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    let stop = StopFlag::new();
    shutdown::install_handler(stop.clone())?;

    run_monitor(&port_path, ReaderConfig::from(&config), &stop)?;
    Ok(())
}

/// Defaults, then the config file, then CLI flags
fn build_config(cli: &Cli) -> Result<MonitorConfig> {
    let mut config = match cli.config {
        Some(ref path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };

    if let Some(ref dir) = cli.dev_dir {
        config = config.with_device_dir(dir.clone());
    }
    if let Some(ms) = cli.poll_ms {
        config = config.with_poll_timeout(Duration::from_millis(ms));
    }

    config.validate()?;
    log::debug!("{:?}", config);
    Ok(config)
}

fn handle_list(config: &MonitorConfig) -> Result<()> {
    println!(
        "{} Device nodes in {} matching {}*",
        "[*]".cyan().bold(),
        config.device_dir.display(),
        config.listing_prefix
    );
    print_candidates(&config.device_dir, &config.listing_prefix)?;

    #[cfg(feature = "serial")]
    discovery::listing::print_usb_ports()?;

    Ok(())
}
