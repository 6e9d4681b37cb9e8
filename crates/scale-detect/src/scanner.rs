//! Serial port scanner
//!
//! This module lists the serial ports a scale might be attached to.

use std::path::Path;

use serde::Serialize;
use serialport::{available_ports, SerialPortType};
use tracing::info;

use crate::error::DetectError;

/// A serial port as reported by the operating system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDescriptor {
    /// Device path (e.g., /dev/ttyUSB0, COM3)
    pub device: String,
    /// Short display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Human-readable description
    pub description: String,
    /// Hardware identifier (USB VID:PID and serial number when known)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hwid: Option<String>,
}

impl PortDescriptor {
    /// Create from serialport crate's port info
    fn from_serialport(device: String, port_type: &SerialPortType) -> Self {
        let name = Path::new(&device)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());

        match port_type {
            SerialPortType::UsbPort(usb) => {
                let description = usb
                    .product
                    .clone()
                    .or_else(|| usb.manufacturer.clone())
                    .unwrap_or_else(|| "USB Serial Device".to_string());
                let mut hwid = format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid);
                if let Some(serial) = &usb.serial_number {
                    hwid.push_str(&format!(" SER={}", serial));
                }
                Self {
                    device,
                    name,
                    description,
                    hwid: Some(hwid),
                }
            }
            SerialPortType::PciPort => Self {
                device,
                name,
                description: "PCI Serial Port".to_string(),
                hwid: Some("PCI".to_string()),
            },
            SerialPortType::BluetoothPort => Self {
                device,
                name,
                description: "Bluetooth Serial Port".to_string(),
                hwid: None,
            },
            SerialPortType::Unknown => Self {
                device,
                name,
                description: "n/a".to_string(),
                hwid: None,
            },
        }
    }
}

/// Serial port scanner configuration
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Skip ports matching these patterns
    pub skip_patterns: Vec<String>,
}

/// Serial port scanner
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self {
            config: ScannerConfig {
                skip_patterns: vec![
                    // Bluetooth ports on macOS
                    "Bluetooth".to_string(),
                    // Debug/logging ports
                    "debug".to_string(),
                ],
            },
        }
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate all available serial ports
    pub fn enumerate_ports(&self) -> Result<Vec<PortDescriptor>, DetectError> {
        info!("Enumerating serial ports...");
        let ports = available_ports().map_err(|e| DetectError::EnumerationFailed(e.to_string()))?;

        let result: Vec<_> = ports
            .into_iter()
            .map(|p| PortDescriptor::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip_port(p))
            .collect();

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                info!("  {} - {}", port.device, port.description);
            }
        }

        Ok(result)
    }

    /// Check if a port should be skipped
    fn should_skip_port(&self, port: &PortDescriptor) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.device.contains(pattern.as_str()))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}
