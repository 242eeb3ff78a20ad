//! Serial Channel Management
//!
//! Owns the connection to the acquisition board: open, poll for lines,
//! detect failure, close. The orchestration loop in [`crate::capture`]
//! drives the reconnect sequence on top of this module.

mod error;
mod manager;
pub mod serial;
mod stream;

pub use error::ChannelError;
pub use manager::{Channel, SerialTransport, Transport};
pub use serial::{list_ports, PortInfo};
pub use stream::{CaptureStream, SerialStream};

/// Default baud rate for the acquisition board
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout in milliseconds.
/// Short enough that the loop stays responsive to a shutdown request.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;
