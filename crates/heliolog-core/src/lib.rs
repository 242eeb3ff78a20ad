//! # heliolog core library
//!
//! Capture pipeline for the heliolog daemon.
//!
//! A solar-tracker board prints one reading per line over its serial
//! port: voltage, current, power, two servo angles, and four LDR values.
//! This library owns everything between that wire and the on-disk log:
//!
//! - serial channel lifecycle (open, poll, detect failure, reopen)
//! - shaping raw lines into timestamped [`record::Reading`]s
//! - appending readings to a header-stamped CSV store
//! - the connect / listen / terminate loop composing the above
//!
//! The daemon binary is a thin shell around [`capture::Capture::run`].

#![warn(missing_docs)]

pub mod capture;
pub mod channel;
pub mod config;
pub mod logfile;
pub mod record;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::capture::{Capture, CaptureState, CaptureStats, StopReason};
    pub use crate::channel::{Channel, ChannelError, SerialTransport, Transport};
    pub use crate::config::CaptureConfig;
    pub use crate::logfile::{LogWriter, WriteError};
    pub use crate::record::{MalformedRecord, Reading};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
