//! Channel errors

use thiserror::Error;

/// Errors that can occur on the serial channel
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial port error: {0}")]
    Serial(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
