//! Capture loop
//!
//! Composes the channel, parser, and log writer into the connect,
//! listen, terminate state machine. One sequential control flow: a
//! reading is fully persisted or fully discarded before the next poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::channel::{list_ports, Channel, Transport};
use crate::config::CaptureConfig;
use crate::logfile::LogWriter;
use crate::record::Reading;

/// Slice width for the reconnect wait, so cancellation stays responsive
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Capture loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Opening the serial channel
    Connecting,
    /// Polling the channel for readings
    Listening,
    /// Loop has ended
    Terminated,
}

/// Why the capture loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Operator requested shutdown
    Cancelled,
    /// The channel could not be opened at startup
    ConnectFailed,
    /// The single reopen attempt after a channel fault failed
    ReconnectFailed,
}

/// Session counters reported in the shutdown diagnostic
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    /// Rows appended to the log store
    pub rows_written: u64,
    /// Lines dropped for a wrong field count
    pub rows_rejected: u64,
    /// Readings dropped because the append failed
    pub write_failures: u64,
    /// Successful reopens after a channel fault
    pub reconnects: u64,
}

/// One capture session: owns the channel, the writer, and the loop
pub struct Capture<T: Transport> {
    config: CaptureConfig,
    transport: T,
    writer: LogWriter,
    cancel: Arc<AtomicBool>,
    state: CaptureState,
    stats: CaptureStats,
}

impl<T: Transport> Capture<T> {
    /// Create a session; nothing is opened until [`Capture::run`]
    pub fn new(config: CaptureConfig, transport: T, cancel: Arc<AtomicBool>) -> Self {
        let writer = LogWriter::new(config.log_path.clone());
        Self {
            config,
            transport,
            writer,
            cancel,
            state: CaptureState::Connecting,
            stats: CaptureStats::default(),
        }
    }

    /// Current loop state
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Session counters
    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Run the capture loop to completion
    pub fn run(&mut self) -> StopReason {
        let reason = self.run_inner();
        self.state = CaptureState::Terminated;
        info!(
            "capture ended ({:?}): {} rows written, {} rejected, {} write failures, {} reconnects",
            reason,
            self.stats.rows_written,
            self.stats.rows_rejected,
            self.stats.write_failures,
            self.stats.reconnects
        );
        reason
    }

    fn run_inner(&mut self) -> StopReason {
        self.state = CaptureState::Connecting;
        let mut channel = match self.open_channel() {
            Some(channel) => channel,
            None => return StopReason::ConnectFailed,
        };

        // Header goes in before the first reading, and only into an
        // empty store. A failure here is reported and not escalated;
        // each append will fail loudly on its own.
        if let Err(e) = self.writer.ensure_initialized() {
            error!("log store initialization failed: {}", e);
        }

        self.state = CaptureState::Listening;
        info!("listening for readings");

        loop {
            if self.cancelled() {
                channel.close();
                info!("shutdown requested, channel closed");
                return StopReason::Cancelled;
            }

            match channel.read_line() {
                Ok(Some(line)) if !line.is_empty() => self.ingest(&line),
                Ok(Some(_)) => {} // blank line between readings
                Ok(None) => std::thread::sleep(self.config.idle_poll()),
                Err(e) => {
                    warn!("channel fault: {}", e);
                    channel.close();

                    if !self.wait_before_reconnect() {
                        info!("shutdown requested while waiting to reconnect");
                        return StopReason::Cancelled;
                    }

                    self.state = CaptureState::Connecting;
                    match self.open_channel() {
                        Some(reopened) => {
                            self.stats.reconnects += 1;
                            channel = reopened;
                            self.state = CaptureState::Listening;
                            info!("channel reopened, resuming capture");
                        }
                        None => return StopReason::ReconnectFailed,
                    }
                }
            }
        }
    }

    /// Route one non-empty line through the parser and the writer
    fn ingest(&mut self, line: &str) {
        match Reading::capture(line) {
            Ok(reading) => match self.writer.append(&reading) {
                Ok(()) => self.stats.rows_written += 1,
                Err(e) => {
                    self.stats.write_failures += 1;
                    error!("reading dropped: {}", e);
                }
            },
            Err(e) => {
                self.stats.rows_rejected += 1;
                warn!("line discarded: {}", e);
            }
        }
    }

    fn open_channel(&mut self) -> Option<Channel> {
        match self.transport.open(&self.config) {
            Ok(channel) => Some(channel),
            Err(e) => {
                error!("could not open {}: {}", self.config.port_name, e);
                log_available_ports();
                None
            }
        }
    }

    /// Sleep out the reconnect delay in short slices. Returns false if
    /// the operator cancelled while waiting.
    fn wait_before_reconnect(&self) -> bool {
        info!(
            "waiting {}s before reopening channel",
            self.config.reconnect_delay_secs
        );
        let deadline = Instant::now() + self.config.reconnect_delay();
        loop {
            if self.cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

fn log_available_ports() {
    let ports = list_ports();
    if ports.is_empty() {
        info!("no serial ports detected");
    } else {
        let names: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
        info!("available serial ports: {}", names.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{CaptureStream, ChannelError};
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::io::{self, Read};
    use std::path::Path;
    use tempfile::TempDir;

    enum Step {
        /// One complete line, terminator included by the stream
        Line(&'static str),
        /// Transport-level failure
        Fault,
        /// Operator presses ctrl-c mid-session
        Cancel(Arc<AtomicBool>),
    }

    struct ScriptedStream {
        steps: VecDeque<Step>,
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(Step::Line(line)) => {
                    let bytes = format!("{}\n", line);
                    buf[..bytes.len()].copy_from_slice(bytes.as_bytes());
                    Ok(bytes.len())
                }
                Some(Step::Fault) => {
                    Err(io::Error::new(io::ErrorKind::BrokenPipe, "device detached"))
                }
                Some(Step::Cancel(flag)) => {
                    flag.store(true, Ordering::SeqCst);
                    Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
                }
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "no data")),
            }
        }
    }

    impl CaptureStream for ScriptedStream {
        fn clear_input_buffer(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn bytes_to_read(&mut self) -> io::Result<u32> {
            Ok(if self.steps.is_empty() { 0 } else { 64 })
        }
    }

    /// Hands out pre-scripted channels, one per open attempt
    struct ScriptedTransport {
        sessions: VecDeque<Result<Vec<Step>, ()>>,
        opens: usize,
    }

    impl ScriptedTransport {
        fn new(sessions: Vec<Result<Vec<Step>, ()>>) -> Self {
            Self {
                sessions: sessions.into(),
                opens: 0,
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn open(&mut self, _config: &CaptureConfig) -> Result<Channel, ChannelError> {
            self.opens += 1;
            match self.sessions.pop_front() {
                Some(Ok(steps)) => Ok(Channel::new(Box::new(ScriptedStream {
                    steps: steps.into(),
                }))),
                Some(Err(())) | None => Err(ChannelError::Serial("port gone".to_string())),
            }
        }
    }

    fn test_config(dir: &TempDir) -> CaptureConfig {
        CaptureConfig {
            log_path: dir.path().join("log.csv"),
            reconnect_delay_secs: 0,
            idle_poll_ms: 1,
            ..CaptureConfig::default()
        }
    }

    fn rows(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    const LINE_A: &str = "3.3,0.5,1.65,90,45,512,300,700,100";
    const LINE_B: &str = "3.2,0.4,1.28,91,44,500,310,690,110";

    #[test]
    fn test_fault_then_successful_reopen_keeps_appending() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let transport = ScriptedTransport::new(vec![
            Ok(vec![Step::Line(LINE_A), Step::Fault]),
            Ok(vec![Step::Line(LINE_B), Step::Fault]),
        ]);

        let mut capture = Capture::new(config, transport, Arc::new(AtomicBool::new(false)));
        let reason = capture.run();

        assert_eq!(reason, StopReason::ReconnectFailed);
        assert_eq!(capture.state(), CaptureState::Terminated);
        assert_eq!(capture.stats().rows_written, 2);
        assert_eq!(capture.stats().reconnects, 1);

        let rows = rows(capture.writer.path());
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("Timestamp,"));
        assert!(rows[1].ends_with(LINE_A));
        assert!(rows[2].ends_with(LINE_B));
    }

    #[test]
    fn test_reopen_failure_terminates_without_further_writes() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let transport = ScriptedTransport::new(vec![
            Ok(vec![Step::Line(LINE_A), Step::Fault]),
            Err(()),
        ]);

        let mut capture = Capture::new(config, transport, Arc::new(AtomicBool::new(false)));
        let reason = capture.run();

        assert_eq!(reason, StopReason::ReconnectFailed);
        assert_eq!(capture.stats().rows_written, 1);
        assert_eq!(capture.stats().reconnects, 0);
        assert_eq!(rows(capture.writer.path()).len(), 2);
    }

    #[test]
    fn test_startup_open_failure_terminates_before_touching_the_store() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let log_path = config.log_path.clone();
        let transport = ScriptedTransport::new(vec![Err(())]);

        let mut capture = Capture::new(config, transport, Arc::new(AtomicBool::new(false)));
        let reason = capture.run();

        assert_eq!(reason, StopReason::ConnectFailed);
        assert_eq!(capture.state(), CaptureState::Terminated);
        assert!(!log_path.exists());
    }

    #[test]
    fn test_cancellation_stops_the_loop_after_closing() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let cancel = Arc::new(AtomicBool::new(false));
        let transport = ScriptedTransport::new(vec![Ok(vec![
            Step::Line(LINE_A),
            Step::Cancel(Arc::clone(&cancel)),
        ])]);

        let mut capture = Capture::new(config, transport, cancel);
        let reason = capture.run();

        assert_eq!(reason, StopReason::Cancelled);
        assert_eq!(capture.stats().rows_written, 1);
    }

    #[test]
    fn test_malformed_and_blank_lines_are_dropped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let transport = ScriptedTransport::new(vec![Ok(vec![
            Step::Line("3.3,0.5"),
            Step::Line(""),
            Step::Line(LINE_A),
            Step::Fault,
        ])]);

        let mut capture = Capture::new(config, transport, Arc::new(AtomicBool::new(false)));
        capture.run();

        assert_eq!(capture.stats().rows_written, 1);
        assert_eq!(capture.stats().rows_rejected, 1);
        assert_eq!(rows(capture.writer.path()).len(), 2);
    }

    #[test]
    fn test_write_failure_drops_the_reading_and_keeps_listening() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        // Destination directory does not exist, so every write fails
        config.log_path = dir.path().join("missing").join("log.csv");
        let transport = ScriptedTransport::new(vec![Ok(vec![
            Step::Line(LINE_A),
            Step::Line(LINE_B),
            Step::Fault,
        ])]);

        let mut capture = Capture::new(config, transport, Arc::new(AtomicBool::new(false)));
        let reason = capture.run();

        // Write failures never escalate to a reconnect or termination
        assert_eq!(reason, StopReason::ReconnectFailed);
        assert_eq!(capture.stats().rows_written, 0);
        assert_eq!(capture.stats().write_failures, 2);
    }

    #[test]
    fn test_exactly_one_reopen_attempt_per_fault() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let transport = ScriptedTransport::new(vec![Ok(vec![Step::Fault]), Err(())]);

        let mut capture = Capture::new(config, transport, Arc::new(AtomicBool::new(false)));
        let reason = capture.run();

        assert_eq!(reason, StopReason::ReconnectFailed);
        assert_eq!(capture.transport.opens, 2);
    }
}
