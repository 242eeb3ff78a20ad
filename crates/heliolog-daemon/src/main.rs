//! heliolog daemon
//!
//! Opens the configured serial port, ingests one sensor reading per
//! line, and appends each reading, timestamped, to the CSV log store.
//! Runs until interrupted or until a lost channel cannot be reopened.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use heliolog_core::capture::{Capture, StopReason};
use heliolog_core::channel::SerialTransport;
use heliolog_core::config::CaptureConfig;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    info!(
        "heliolog {} capturing {} at {} baud into {}",
        heliolog_core::VERSION,
        config.port_name,
        config.baud_rate,
        config.log_path.display()
    );

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("failed to install interrupt handler")?;

    let mut capture = Capture::new(config, SerialTransport, cancel);
    match capture.run() {
        StopReason::Cancelled => info!("terminated by operator"),
        StopReason::ConnectFailed => info!("channel could not be opened; exiting"),
        StopReason::ReconnectFailed => info!("channel lost and could not be reopened; exiting"),
    }

    Ok(())
}

/// Configuration comes from an optional JSON file named as the only
/// argument; without one, defaults matching the stock board wiring apply.
fn load_config() -> anyhow::Result<CaptureConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("could not read config file {}", path))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("could not parse config file {}", path))
        }
        None => Ok(CaptureConfig::default()),
    }
}
