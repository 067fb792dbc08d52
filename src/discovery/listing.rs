//! Device directory listing
//!
//! Shown to the user when no known USB serial device was found, and by
//! `--list`.

use crate::error::{MonitorError, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Names of all entries directly inside `dir`, sorted ascending
pub fn device_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| MonitorError::Listing {
            dir: dir.to_path_buf(),
            source: e.into(),
        })?;
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    Ok(names)
}

/// Device nodes whose names start with `prefix`
pub fn candidate_nodes(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    Ok(device_names(dir)?
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .map(|name| dir.join(name))
        .collect())
}

/// Print the plausible device nodes in `dir`
pub fn print_candidates(dir: &Path, prefix: &str) -> Result<()> {
    let nodes = candidate_nodes(dir, prefix)?;

    if nodes.is_empty() {
        println!(
            "{}",
            format!("No {}* devices in {}", prefix, dir.display()).yellow()
        );
        println!("\n{}", "Troubleshooting tips:".cyan().bold());
        println!("  1. Check the USB cable carries data, not just power");
        println!("  2. Check dmesg for connection events: dmesg | tail -20");
        println!("  3. Add your user to the 'dialout' group: sudo usermod -aG dialout $USER");
        return Ok(());
    }

    println!("{}", "Available ports:".green().bold());
    for node in nodes {
        println!("  {}", node.display());
    }

    Ok(())
}

/// Print USB metadata for every port the OS enumerates
#[cfg(feature = "serial")]
pub fn print_usb_ports() -> anyhow::Result<()> {
    use anyhow::Context;
    use serialport::SerialPortType;

    let ports =
        serialport::available_ports().with_context(|| "Failed to enumerate serial ports")?;

    let usb: Vec<_> = ports
        .into_iter()
        .filter_map(|p| match p.port_type {
            SerialPortType::UsbPort(info) => Some((p.port_name, info)),
            _ => None,
        })
        .collect();

    if usb.is_empty() {
        println!("{}", "No USB serial ports enumerated".yellow());
        return Ok(());
    }

    println!("\n{}", "USB serial ports:".green().bold());
    for (name, info) in usb {
        println!("\n  {}", name.white().bold());
        println!("    VID:PID: {:04x}:{:04x}", info.vid, info.pid);
        if let Some(ref mfg) = info.manufacturer {
            println!("    Manufacturer: {}", mfg);
        }
        if let Some(ref prod) = info.product {
            println!("    Product: {}", prod);
        }
        if let Some(ref sn) = info.serial_number {
            println!("    Serial: {}", sn);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_names_sorted() {
        let dir = tempdir().unwrap();
        for name in ["ttyUSB1", "null", "ttyACM0", "ttyUSB0"] {
            File::create(dir.path().join(name)).unwrap();
        }

        assert_eq!(
            device_names(dir.path()).unwrap(),
            vec!["null", "ttyACM0", "ttyUSB0", "ttyUSB1"]
        );
    }

    #[test]
    fn test_listing_does_not_descend() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("serial")).unwrap();
        File::create(dir.path().join("serial").join("ttyACM9")).unwrap();

        assert_eq!(device_names(dir.path()).unwrap(), vec!["serial"]);
    }

    #[test]
    fn test_candidates_filter_prefix() {
        let dir = tempdir().unwrap();
        for name in ["tty", "ttyS0", "null", "cu.usbmodem1"] {
            File::create(dir.path().join(name)).unwrap();
        }

        assert_eq!(
            candidate_nodes(dir.path(), "tty").unwrap(),
            vec![dir.path().join("tty"), dir.path().join("ttyS0")]
        );
        assert_eq!(
            candidate_nodes(dir.path(), "cu.").unwrap(),
            vec![dir.path().join("cu.usbmodem1")]
        );
    }

    #[test]
    fn test_missing_dir_is_listing_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        match device_names(&missing) {
            Err(MonitorError::Listing { dir: d, .. }) => assert_eq!(d, missing),
            other => panic!("expected Listing error, got {:?}", other),
        }
    }
}
