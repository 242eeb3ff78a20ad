//! Log store
//!
//! The append-only CSV destination for captured readings. The header is
//! stamped exactly once, only into an empty file; everything after that
//! is append.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::record::Reading;

/// Column header stamped into an empty log store
pub const LOG_COLUMNS: [&str; 10] = [
    "Timestamp",
    "Voltage",
    "Current",
    "Power",
    "Servo Angle 1",
    "Servo Angle 2",
    "LDR Value 1",
    "LDR Value 2",
    "LDR Value 3",
    "LDR Value 4",
];

/// Errors raised by the log store
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to open log store {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append to log store {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to flush log store {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Appends readings to a header-stamped CSV file
pub struct LogWriter {
    path: PathBuf,
}

impl LogWriter {
    /// Create a writer for the given destination; no I/O happens yet
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the destination for append, creating it if absent, and stamp
    /// the column header if the file is empty.
    ///
    /// Called once at startup. Reopening a non-empty store never
    /// rewrites the header.
    pub fn ensure_initialized(&self) -> Result<(), WriteError> {
        let mut file = self.open_append()?;
        let len = file
            .metadata()
            .map_err(|source| WriteError::Open {
                path: self.path.clone(),
                source,
            })?
            .len();

        if len == 0 {
            self.write_row(&mut file, &LOG_COLUMNS.join(","))?;
        }

        info!("log store ready at {}", self.path.display());
        Ok(())
    }

    /// Append one reading as a CSV row, durably flushed before returning.
    ///
    /// On failure the reading is gone; there is no retry or buffering.
    pub fn append(&self, reading: &Reading) -> Result<(), WriteError> {
        let mut file = self.open_append()?;
        let row = reading.row();
        self.write_row(&mut file, &row)?;
        info!("saved: {}", row);
        Ok(())
    }

    fn open_append(&self) -> Result<File, WriteError> {
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|source| WriteError::Open {
                path: self.path.clone(),
                source,
            })
    }

    fn write_row(&self, file: &mut File, row: &str) -> Result<(), WriteError> {
        writeln!(file, "{}", row).map_err(|source| WriteError::Append {
            path: self.path.clone(),
            source,
        })?;
        file.sync_data().map_err(|source| WriteError::Flush {
            path: self.path.clone(),
            source,
        })
    }
}
