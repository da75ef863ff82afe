//! Serial port transport
//!
//! Connects to a printer controller over USB CDC or an RS-232 adapter.
//!
//! Supports:
//! - Port enumeration filtered to likely controller devices
//! - Baud rate configuration
//! - Non-blocking single-byte reads over a short port timeout

use crate::communication::Transport;
use printbridge_core::{ConnectionError, Result};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Read timeout used to emulate non-blocking reads
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Bytes fetched from the port per read call
const READ_CHUNK: usize = 64;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// Serial number if available
    pub serial_number: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set serial number
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List serial ports that look like printer controllers
///
/// Filters to:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ConnectionError::SerialError {
            reason: format!("Failed to enumerate ports: {}", e),
        }
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_controller_port(&port.port_name))
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, port_description(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let mut info = info.with_usb_ids(usb.vid, usb.pid);
                    if let Some(ref mfg) = usb.manufacturer {
                        info = info.with_manufacturer(mfg);
                    }
                    if let Some(ref serial) = usb.serial_number {
                        info = info.with_serial_number(serial);
                    }
                    info
                }
                _ => info,
            }
        })
        .collect())
}

/// Check if a port name matches a USB/ACM style controller device
pub fn is_controller_port(port_name: &str) -> bool {
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    port_name.starts_with("/dev/ttyUSB")
        || port_name.starts_with("/dev/ttyACM")
        || port_name.starts_with("/dev/cu.usbserial-")
        || port_name.starts_with("/dev/cu.usbmodem")
}

fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb) => format!(
            "USB {} {}",
            usb.manufacturer.as_deref().unwrap_or("Device"),
            usb.product.as_deref().unwrap_or("Serial Port")
        ),
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Serial connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialParams {
    /// Port name
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl Default for SerialParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115_200,
        }
    }
}

impl SerialParams {
    /// Parameters for `port` at `baud_rate`
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
        }
    }

    /// Check the parameters before opening a port
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(ConnectionError::InvalidParameters {
                reason: "port name is empty".to_string(),
            }
            .into());
        }
        if self.baud_rate == 0 {
            return Err(ConnectionError::InvalidParameters {
                reason: "baud rate must be > 0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Transport over a real serial port
///
/// Reads are fetched in small chunks and served one byte at a time; a port
/// timeout counts as "no byte available".
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    name: String,
    pending: [u8; READ_CHUNK],
    pending_start: usize,
    pending_end: usize,
}

impl SerialTransport {
    /// Open a serial port (8N1, no hardware flow control)
    pub fn open(params: &SerialParams) -> Result<Self> {
        params.validate()?;

        let port = serialport::new(&params.port, params.baud_rate)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| {
                tracing::warn!("Failed to open serial port {}: {}", params.port, e);
                ConnectionError::FailedToOpen {
                    port: params.port.clone(),
                    reason: e.to_string(),
                }
            })?;

        tracing::info!("Opened {} at {} baud", params.port, params.baud_rate);
        Ok(Self {
            port,
            name: params.port.clone(),
            pending: [0; READ_CHUNK],
            pending_start: 0,
            pending_end: 0,
        })
    }

    fn io_error(&self, e: io::Error) -> printbridge_core::Error {
        ConnectionError::SerialError {
            reason: format!("{}: {}", self.name, e),
        }
        .into()
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.port.write_all(&[byte]).map_err(|e| self.io_error(e))
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        if self.pending_start == self.pending_end {
            match self.port.read(&mut self.pending) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    self.pending_start = 0;
                    self.pending_end = n;
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    return Ok(None)
                }
                Err(e) => return Err(self.io_error(e)),
            }
        }

        let byte = self.pending[self.pending_start];
        self.pending_start += 1;
        Ok(Some(byte))
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush().map_err(|e| self.io_error(e))
    }
}
