//! Sensor records
//!
//! Shapes one raw line from the board into a timestamped [`Reading`].

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

/// Number of data fields the board emits per line
pub const SENSOR_FIELD_COUNT: usize = 9;

/// Timestamp format stored in the log (second precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A line that did not contain exactly [`SENSOR_FIELD_COUNT`] fields
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected 9 fields, got {found}: {line:?}")]
pub struct MalformedRecord {
    /// The raw line as received
    pub line: String,
    /// Number of comma-separated fields observed
    pub found: usize,
}

/// One ingested sensor reading, ready for persistence.
///
/// Fields are carried as opaque tokens in board order; numeric
/// interpretation belongs to whatever consumes the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reading {
    /// Wall-clock capture time, formatted per [`TIMESTAMP_FORMAT`]
    pub captured_at: String,

    /// The raw field values: voltage, current, power, two servo angles,
    /// four LDR values
    pub fields: Vec<String>,
}

impl Reading {
    /// Parse one raw line, stamping `captured_at`.
    ///
    /// Only the field count is validated; a wrong count rejects the
    /// whole line and no record exists.
    pub fn parse(line: &str, captured_at: DateTime<Local>) -> Result<Self, MalformedRecord> {
        let fields: Vec<String> = line.split(',').map(str::to_string).collect();
        if fields.len() != SENSOR_FIELD_COUNT {
            return Err(MalformedRecord {
                line: line.to_string(),
                found: fields.len(),
            });
        }

        Ok(Self {
            captured_at: captured_at.format(TIMESTAMP_FORMAT).to_string(),
            fields,
        })
    }

    /// Parse one raw line, stamped with the current wall-clock time
    pub fn capture(line: &str) -> Result<Self, MalformedRecord> {
        Self::parse(line, Local::now())
    }

    /// The full 10-field CSV row: timestamp followed by the data fields
    pub fn row(&self) -> String {
        format!("{},{}", self.captured_at, self.fields.join(","))
    }
}
