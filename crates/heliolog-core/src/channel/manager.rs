//! Channel lifecycle
//!
//! A [`Channel`] owns one open transport and yields whole lines from it.
//! Reads are polled, never blocking longer than the transport's timeout,
//! so the capture loop stays responsive to a shutdown request.

use std::io;
use tracing::{debug, info};

use super::serial::{configure_port, open_port};
use super::stream::{CaptureStream, SerialStream};
use super::ChannelError;
use crate::config::CaptureConfig;

/// How a channel gets opened.
///
/// Production code uses [`SerialTransport`]; tests substitute scripted
/// implementations to drive the reconnect sequence.
pub trait Transport {
    /// Establish the transport described by `config`
    fn open(&mut self, config: &CaptureConfig) -> Result<Channel, ChannelError>;
}

/// Opens real serial ports as configured
pub struct SerialTransport;

impl Transport for SerialTransport {
    fn open(&mut self, config: &CaptureConfig) -> Result<Channel, ChannelError> {
        let mut port = open_port(&config.port_name, config.baud_rate, config.read_timeout())?;
        configure_port(port.as_mut())?;
        let mut stream = SerialStream::new(port);
        // Start at a line boundary: drop whatever accumulated before we attached.
        // A residual partial line is caught later by the field-count check.
        stream.clear_input_buffer()?;
        info!(
            "connected to {} at {} baud",
            config.port_name, config.baud_rate
        );
        Ok(Channel::new(Box::new(stream)))
    }
}

/// A live connection to the acquisition board
pub struct Channel {
    stream: Option<Box<dyn CaptureStream>>,
    pending: Vec<u8>,
}

impl Channel {
    /// Wrap an open transport
    pub fn new(stream: Box<dyn CaptureStream>) -> Self {
        Self {
            stream: Some(stream),
            pending: Vec::new(),
        }
    }

    /// Whether the transport is still held
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Poll for one complete line.
    ///
    /// Returns `Ok(None)` when no complete line is available yet. Lines
    /// are decoded as UTF-8 (lossily) and trimmed of surrounding
    /// whitespace, including the terminator.
    pub fn read_line(&mut self) -> Result<Option<String>, ChannelError> {
        // Serve a buffered line before touching the transport again
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }

        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Ok(None),
        };

        if stream.bytes_to_read()? == 0 {
            return Ok(None);
        }

        let mut buf = [0u8; 256];
        match stream.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(n) => {
                self.pending.extend_from_slice(&buf[..n]);
                Ok(self.take_line())
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(ChannelError::Io(e)),
        }
    }

    /// Pop the first complete line out of the pending buffer
    fn take_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&raw).trim().to_string())
    }

    /// Release the transport. Safe to call on an already-closed channel.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("serial channel closed");
        }
        self.pending.clear();
    }
}
