//! Serial output monitor
//!
//! Owns the open device and copies everything it receives to an output sink
//! (stdout in practice), one flushed chunk at a time, until stopped.

use super::port::{configure_port, open_port, LineConfig};
use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::shutdown::StopFlag;
use colored::Colorize;
use log::{debug, warn};
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Capacity of the receive buffer; a single read fills at most one byte less
pub const RECEIVE_BUFFER_SIZE: usize = 1024;

/// Pause after a failed read before trying again
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Lifecycle of a [`SerialReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// No device held
    Closed,
    /// Acquiring the device node
    Opening,
    /// Line settings applied or being applied; an opened reader rests here
    /// until [`SerialReader::stream`] starts
    Configuring,
    /// Copying received bytes to the output
    Streaming,
}

/// Reader settings
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub line: LineConfig,
    /// Wait for readability per loop iteration
    pub poll_timeout: Duration,
    /// Consecutive read failures tolerated before giving up
    pub max_read_errors: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for ReaderConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            line: LineConfig::default(),
            poll_timeout: config.poll_timeout,
            max_read_errors: config.max_read_errors,
        }
    }
}

/// Counters collected while streaming
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub bytes: u64,
    pub chunks: u64,
    pub idle_waits: u64,
    pub read_errors: u64,
}

enum Readiness {
    Idle,
    Readable { hangup: bool },
    Hangup,
}

/// Wait up to `timeout_ms` for `fd` to become readable
fn wait_readable(fd: RawFd, timeout_ms: libc::c_int) -> io::Result<Readiness> {
    let mut fds = [libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    }];

    // SAFETY: `fds` is a valid array of pollfd for the duration of the call
    let retval = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };

    if retval < 0 {
        let err = io::Error::last_os_error();
        // a signal (Ctrl+C) landed on this thread; the stop flag decides
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(Readiness::Idle);
        }
        return Err(err);
    }
    if retval == 0 {
        return Ok(Readiness::Idle);
    }

    let revents = fds[0].revents;
    let hangup = revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0;
    if revents & libc::POLLIN != 0 {
        Ok(Readiness::Readable { hangup })
    } else if hangup {
        Ok(Readiness::Hangup)
    } else {
        Ok(Readiness::Idle)
    }
}

/// Consecutive read failures since the last successful read
#[derive(Debug)]
struct FailureStreak {
    count: u32,
    limit: u32,
}

impl FailureStreak {
    fn new(limit: u32) -> Self {
        Self { count: 0, limit }
    }

    /// Count one failure; true once `limit` failures happened in a row
    fn fail(&mut self) -> bool {
        self.count += 1;
        self.count >= self.limit
    }

    fn reset(&mut self) {
        self.count = 0;
    }

    fn count(&self) -> u32 {
        self.count
    }
}

fn hangup_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "device hung up")
}

/// Receive-only serial reader
///
/// Created by [`SerialReader::open`], which runs the `Opening` and
/// `Configuring` phases. [`SerialReader::stream`] runs until the stop flag is
/// set or the device fails, then closes the device.
pub struct SerialReader {
    path: PathBuf,
    config: ReaderConfig,
    port: Option<File>,
    buffer: Box<[u8]>,
    state: ReaderState,
}

impl SerialReader {
    /// Open and configure the device at `path`
    pub fn open(path: &Path, config: ReaderConfig) -> Result<Self> {
        let mut reader = Self {
            path: path.to_path_buf(),
            config,
            port: None,
            buffer: vec![0u8; RECEIVE_BUFFER_SIZE].into_boxed_slice(),
            state: ReaderState::Closed,
        };

        reader.enter(ReaderState::Opening);
        let port = open_port(path)?;

        reader.enter(ReaderState::Configuring);
        configure_port(&port, path, &reader.config.line)?;

        reader.port = Some(port);
        Ok(reader)
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Last phase entered
    pub fn state(&self) -> ReaderState {
        self.state
    }

    fn enter(&mut self, state: ReaderState) {
        debug!("{}: {:?} -> {:?}", self.path.display(), self.state, state);
        self.state = state;
    }

    /// Copy received bytes to `out` until `stop` is set.
    ///
    /// Each non-empty read is written and flushed before the next wait. The
    /// device is closed when this returns, whatever the outcome.
    pub fn stream<W: Write>(&mut self, out: &mut W, stop: &StopFlag) -> Result<StreamStats> {
        self.enter(ReaderState::Streaming);
        let result = self.stream_until_stopped(out, stop);
        self.close();

        if let Ok(ref stats) = result {
            debug!(
                "{}: {} bytes in {} chunks, {} idle waits, {} read errors",
                self.path.display(),
                stats.bytes,
                stats.chunks,
                stats.idle_waits,
                stats.read_errors
            );
        }
        result
    }

    fn stream_until_stopped<W: Write>(
        &mut self,
        out: &mut W,
        stop: &StopFlag,
    ) -> Result<StreamStats> {
        let mut stats = StreamStats::default();

        let Some(port) = self.port.as_mut() else {
            debug!("{}: already closed", self.path.display());
            return Ok(stats);
        };

        let fd = port.as_raw_fd();
        let timeout_ms = self.config.poll_timeout.as_millis().min(libc::c_int::MAX as u128)
            as libc::c_int;
        let chunk = self.buffer.len() - 1;
        let mut failures = FailureStreak::new(self.config.max_read_errors);

        while !stop.is_stopped() {
            let outcome = match wait_readable(fd, timeout_ms) {
                Ok(Readiness::Idle) => {
                    stats.idle_waits += 1;
                    continue;
                }
                Ok(Readiness::Hangup) => Err(hangup_error()),
                Ok(Readiness::Readable { hangup }) => match port.read(&mut self.buffer[..chunk]) {
                    Ok(0) if hangup => Err(hangup_error()),
                    Ok(count) => Ok(count),
                    Err(ref e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                        ) =>
                    {
                        Ok(0)
                    }
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };

            match outcome {
                Ok(count) => {
                    failures.reset();
                    if count > 0 {
                        out.write_all(&self.buffer[..count])
                            .and_then(|_| out.flush())
                            .map_err(|cause| MonitorError::Output { cause })?;
                        stats.bytes += count as u64;
                        stats.chunks += 1;
                    }
                }
                Err(e) => {
                    stats.read_errors += 1;
                    if failures.fail() {
                        return Err(MonitorError::Read {
                            path: self.path.clone(),
                            failures: failures.count(),
                            cause: e,
                        });
                    }
                    if failures.count() == 1 {
                        warn!("Read error on {}: {} (retrying)", self.path.display(), e);
                    }
                    std::thread::sleep(READ_ERROR_BACKOFF);
                }
            }
        }

        Ok(stats)
    }

    /// Release the device
    pub fn close(&mut self) {
        self.port = None;
        self.enter(ReaderState::Closed);
    }
}

/// Open `path` and stream it to stdout until `stop` is set
pub fn run_monitor(path: &Path, config: ReaderConfig, stop: &StopFlag) -> Result<StreamStats> {
    let mut reader = SerialReader::open(path, config)?;

    println!(
        "{} Connected to {} at {} baud",
        "[OK]".green().bold(),
        path.display().to_string().white().bold(),
        reader.config().line.baud_rate
    );
    println!("{}", "Starting serial monitor (Ctrl+C to stop)...".cyan());

    let mut out = io::stdout();
    out.flush().map_err(|cause| MonitorError::Output { cause })?;

    let result = reader.stream(&mut out, stop);
    debug_assert_eq!(reader.state(), ReaderState::Closed);
    result
}
