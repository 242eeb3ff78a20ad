//! Capture configuration
//!
//! All knobs the daemon exposes, passed explicitly into the channel and
//! writer rather than read from process-wide constants.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::channel::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS};

/// Configuration for one capture session
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Serial port name (e.g., "/dev/ttyACM0" or "COM3")
    pub port_name: String,

    /// Baud rate
    pub baud_rate: u32,

    /// Destination CSV file
    pub log_path: PathBuf,

    /// Serial read timeout in milliseconds
    pub read_timeout_ms: u64,

    /// Delay before the single reopen attempt after a channel fault, in seconds
    pub reconnect_delay_secs: u64,

    /// Pause between polls while the board has nothing pending, in milliseconds
    pub idle_poll_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyACM0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            log_path: PathBuf::from("tracker_data.csv"),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            reconnect_delay_secs: 5,
            idle_poll_ms: 20,
        }
    }
}

impl CaptureConfig {
    /// Serial read timeout as a [`Duration`]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Reconnect delay as a [`Duration`]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// Idle poll pause as a [`Duration`]
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_stock_wiring() {
        let config = CaptureConfig::default();
        assert_eq!(config.port_name, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.log_path, PathBuf::from("tracker_data.csv"));
        assert_eq!(config.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{"port_name": "/dev/ttyUSB1", "baud_rate": 115200}"#).unwrap();
        assert_eq!(config.port_name, "/dev/ttyUSB1");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.log_path, PathBuf::from("tracker_data.csv"));
        assert_eq!(config.reconnect_delay_secs, 5);
    }
}
