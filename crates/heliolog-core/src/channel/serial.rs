//! Serial port handling
//!
//! Low-level access to the acquisition board's serial port.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;

use super::ChannelError;

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyACM0" or "COM3")
    pub name: String,

    /// Product name (if available)
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let product = match info.port_type {
            SerialPortType::UsbPort(usb_info) => usb_info.product,
            _ => None,
        };

        Self {
            name: info.port_name,
            product,
        }
    }
}

/// Helper used to sort port names so that:
///  - ttyACM* ports come first (sorted numerically by suffix)
///  - then ttyUSB* ports (sorted numerically)
///  - then other ports (sorted by name)
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
    {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    // Linux-only: boards enumerated as ttyACM*/ttyUSB* are sometimes
    // missed by the serialport API
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone()).or_insert_with(|| PortInfo {
                        name: full,
                        product: None,
                    });
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Open a serial port with the given baud rate and read timeout
pub fn open_port(
    name: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, ChannelError> {
    serialport::new(name, baud_rate)
        .timeout(timeout)
        .open()
        .map_err(|source| ChannelError::Open {
            port: name.to_string(),
            source,
        })
}

/// Configure a serial port for the acquisition board
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ChannelError> {
    // Standard 8N1 configuration
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| ChannelError::Serial(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| ChannelError::Serial(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| ChannelError::Serial(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| ChannelError::Serial(e.to_string()))?;

    // Keep DTR asserted; Arduino-compatible boards reset when it toggles
    // and the bootloader then swallows the first seconds of output
    if let Err(e) = port.write_data_terminal_ready(true) {
        tracing::debug!("could not assert DTR: {} (continuing)", e);
    }

    Ok(())
}
