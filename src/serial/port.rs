//! Serial device opening and line configuration
//!
//! The device is opened read-only and switched to raw 8N1 at a fixed baud
//! rate through termios directly, so read timeouts (`VTIME`/`VMIN`) are
//! under our control.

use crate::error::{MonitorError, Result};
use log::debug;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

/// Baud rate used by the Arduino sketches we talk to
pub const BAUD_RATE: u32 = 9600;

/// Line settings applied to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    /// Human readable baud rate
    pub baud_rate: u32,
    /// termios speed constant matching `baud_rate`
    pub speed: libc::speed_t,
    /// Read timeout in tenths of a second (`VTIME`)
    pub read_timeout_ds: libc::cc_t,
    /// Minimum bytes for a read to return (`VMIN`)
    pub read_min_bytes: libc::cc_t,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            baud_rate: BAUD_RATE,
            speed: libc::B9600,
            read_timeout_ds: 1,
            read_min_bytes: 0,
        }
    }
}

impl LineConfig {
    /// Rewrite `tty` for raw 8N1 input with no flow control
    pub fn apply(&self, tty: &mut libc::termios) -> io::Result<()> {
        // SAFETY: `tty` is a valid, exclusively borrowed termios struct
        unsafe {
            if libc::cfsetospeed(tty, self.speed) != 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::cfsetispeed(tty, self.speed) != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        // 8N1, no hardware flow control, receiver on, ignore modem lines
        tty.c_cflag &= !(libc::PARENB | libc::CSTOPB | libc::CSIZE | libc::CRTSCTS);
        tty.c_cflag |= libc::CS8 | libc::CREAD | libc::CLOCAL;

        // no canonical mode, echo or signal characters
        tty.c_lflag &= !(libc::ICANON | libc::ECHO | libc::ECHOE | libc::ECHONL | libc::ISIG);

        // no software flow control or input translation
        tty.c_iflag &= !(libc::IXON | libc::IXOFF | libc::IXANY);
        tty.c_iflag &= !(libc::IGNBRK
            | libc::BRKINT
            | libc::PARMRK
            | libc::ISTRIP
            | libc::INLCR
            | libc::IGNCR
            | libc::ICRNL);

        tty.c_oflag &= !libc::OPOST;

        tty.c_cc[libc::VTIME] = self.read_timeout_ds;
        tty.c_cc[libc::VMIN] = self.read_min_bytes;

        Ok(())
    }
}

/// Read the current line attributes of `fd`
pub fn get_attributes(fd: RawFd) -> io::Result<libc::termios> {
    // SAFETY: termios is plain data; tcgetattr fully initializes it on success
    unsafe {
        let mut tty: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut tty) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(tty)
    }
}

/// Commit line attributes to `fd` immediately
pub fn set_attributes(fd: RawFd, tty: &libc::termios) -> io::Result<()> {
    // SAFETY: `tty` points to a valid termios for the duration of the call
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, tty) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Open the device read-only, non-blocking, without taking it as
/// controlling terminal
pub fn open_port(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)
        .map_err(|cause| MonitorError::Open {
            path: path.to_path_buf(),
            cause,
        })
}

/// Apply `line` to an open device
pub fn configure_port(port: &File, path: &Path, line: &LineConfig) -> Result<()> {
    let fd = port.as_raw_fd();

    let mut tty = get_attributes(fd).map_err(|cause| MonitorError::AttributeRead {
        path: path.to_path_buf(),
        cause,
    })?;

    line.apply(&mut tty)
        .and_then(|_| set_attributes(fd, &tty))
        .map_err(|cause| MonitorError::AttributeWrite {
            path: path.to_path_buf(),
            cause,
        })?;

    debug!(
        "{}: raw 8N1 at {} baud, VTIME={} VMIN={}",
        path.display(),
        line.baud_rate,
        line.read_timeout_ds,
        line.read_min_bytes
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn cooked_termios() -> libc::termios {
        let mut tty: libc::termios = unsafe { std::mem::zeroed() };
        tty.c_cflag = libc::PARENB | libc::CSTOPB | libc::CS7 | libc::CRTSCTS;
        tty.c_lflag = libc::ICANON | libc::ECHO | libc::ECHOE | libc::ECHONL | libc::ISIG;
        tty.c_iflag = libc::IXON
            | libc::IXOFF
            | libc::IXANY
            | libc::IGNBRK
            | libc::BRKINT
            | libc::PARMRK
            | libc::ISTRIP
            | libc::INLCR
            | libc::IGNCR
            | libc::ICRNL;
        tty.c_oflag = libc::OPOST;
        tty.c_cc[libc::VTIME] = 0;
        tty.c_cc[libc::VMIN] = 1;
        tty
    }

    #[test]
    fn test_default_line_config() {
        let line = LineConfig::default();
        assert_eq!(line.baud_rate, 9600);
        assert_eq!(line.speed, libc::B9600);
        assert_eq!(line.read_timeout_ds, 1);
        assert_eq!(line.read_min_bytes, 0);
    }

    #[test]
    fn test_apply_makes_raw_8n1() {
        let mut tty = cooked_termios();
        LineConfig::default().apply(&mut tty).unwrap();

        assert_eq!(tty.c_cflag & libc::CSIZE, libc::CS8);
        assert_eq!(tty.c_cflag & (libc::PARENB | libc::CSTOPB | libc::CRTSCTS), 0);
        assert_ne!(tty.c_cflag & libc::CREAD, 0);
        assert_ne!(tty.c_cflag & libc::CLOCAL, 0);

        assert_eq!(
            tty.c_lflag & (libc::ICANON | libc::ECHO | libc::ECHOE | libc::ECHONL | libc::ISIG),
            0
        );
        assert_eq!(tty.c_iflag, 0);
        assert_eq!(tty.c_oflag & libc::OPOST, 0);

        assert_eq!(tty.c_cc[libc::VTIME], 1);
        assert_eq!(tty.c_cc[libc::VMIN], 0);

        unsafe {
            assert_eq!(libc::cfgetispeed(&tty), libc::B9600);
            assert_eq!(libc::cfgetospeed(&tty), libc::B9600);
        }
    }

    #[test]
    fn test_open_missing_device() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ttyACM0");

        let err = open_port(&path).unwrap_err();
        assert!(matches!(err, MonitorError::Open { .. }));
        let msg = err.to_string();
        assert!(msg.contains(&path.display().to_string()));
        assert!(msg.contains("No such file or directory"));
    }

    #[test]
    fn test_configure_regular_file_fails_attribute_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not-a-tty");
        fs::write(&path, b"").unwrap();

        let port = open_port(&path).unwrap();
        let err = configure_port(&port, &path, &LineConfig::default()).unwrap_err();
        assert!(matches!(err, MonitorError::AttributeRead { .. }));
    }
}
