//! Byte transport abstraction
//!
//! The capture loop reads from a [`CaptureStream`] rather than a serial
//! port directly, so fault handling can be exercised without hardware.

use serialport::SerialPort;
use std::io::{self, Read};

/// Abstraction for the byte transport feeding the capture loop
pub trait CaptureStream: Read + Send {
    /// Clear any bytes pending in the input buffer
    fn clear_input_buffer(&mut self) -> io::Result<()>;

    /// Get number of bytes available to read without blocking
    fn bytes_to_read(&mut self) -> io::Result<u32>;
}

/// Serial port wrapper implementing [`CaptureStream`]
pub struct SerialStream {
    port: Box<dyn SerialPort>,
}

impl SerialStream {
    /// Wrap an open serial port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl CaptureStream for SerialStream {
    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port
            .bytes_to_read()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}
