//! Serial port scanner
//!
//! GPIB-USB controllers enumerate as ordinary USB serial ports. This module
//! lists them and flags the ones that look like a Prologix-compatible
//! controller.

use serialport::{available_ports, SerialPortType};
use tracing::info;

use crate::error::DetectError;

/// USB Vendor ID / Product ID pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UsbId {
    vid: u16,
    pid: u16,
}

const fn usb(vid: u16, pid: u16) -> UsbId {
    UsbId { vid, pid }
}

// Bridges used by Prologix GPIB-USB and AR488-style Arduino controllers
const CONTROLLER_IDS: &[UsbId] = &[
    usb(0x0403, 0x6001), // FTDI FT245R (Prologix GPIB-USB 6.0)
    usb(0x0403, 0x6015), // FTDI FT231X
    usb(0x1A86, 0x7523), // WCH CH340 (AR488 clones)
    usb(0x2341, 0x0043), // Arduino Uno
    usb(0x2341, 0x0042), // Arduino Mega 2560
];

/// Information about a serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortInfo {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB serial number (if available)
    pub serial_number: Option<String>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
}

impl SerialPortInfo {
    /// Create from serialport crate's port info
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                serial_number: usb.serial_number.clone(),
                manufacturer: usb.manufacturer.clone(),
                product: usb.product.clone(),
            },
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                serial_number: None,
                manufacturer: None,
                product: None,
            },
        }
    }

    /// Whether this port is probably a GPIB controller
    ///
    /// A product string naming Prologix or GPIB wins outright; otherwise the
    /// USB bridge chip must be one that controllers are built on.
    pub fn is_gpib_controller(&self) -> bool {
        let named = self.product.iter().chain(&self.manufacturer).any(|s| {
            let s = s.to_ascii_uppercase();
            s.contains("PROLOGIX") || s.contains("GPIB") || s.contains("AR488")
        });
        if named {
            return true;
        }

        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => CONTROLLER_IDS.contains(&usb(vid, pid)),
            _ => false,
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
    pub fn enumerate_ports(&self) -> Result<Vec<SerialPortInfo>, DetectError> {
        info!("Enumerating serial ports...");
        let ports = available_ports()?;

        let result: Vec<_> = ports
            .into_iter()
            .map(|p| SerialPortInfo::from_serialport(p.port_name, &p.port_type))
            .filter(|p| !self.should_skip_port(p))
            .collect();

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                let desc = port.product.as_deref().unwrap_or("Unknown");
                let kind = if port.is_gpib_controller() {
                    "GPIB controller"
                } else {
                    "serial"
                };
                info!("  {} - {} ({})", port.port, desc, kind);
            }
        }

        Ok(result)
    }

    /// First port that looks like a GPIB controller
    pub fn find_controller(&self) -> Result<Option<SerialPortInfo>, DetectError> {
        Ok(self
            .enumerate_ports()?
            .into_iter()
            .find(SerialPortInfo::is_gpib_controller))
    }

    /// Check if a port should be skipped
    fn should_skip_port(&self, port: &SerialPortInfo) -> bool {
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.port.contains(pattern))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb_port(vid: u16, pid: u16, product: Option<&str>) -> SerialPortInfo {
        let usb_info = SerialPortType::UsbPort(UsbPortInfo {
            vid,
            pid,
            serial_number: Some("PX9QK1".to_string()),
            manufacturer: Some("FTDI".to_string()),
            product: product.map(str::to_string),
        });
        SerialPortInfo::from_serialport("/dev/ttyUSB0".to_string(), &usb_info)
    }

    #[test]
    fn test_serial_port_info_from_usb() {
        let info = usb_port(0x0403, 0x6001, Some("Prologix GPIB-USB Controller"));

        assert_eq!(info.vid, Some(0x0403));
        assert_eq!(info.pid, Some(0x6001));
        assert!(info.is_gpib_controller());
    }

    #[test]
    fn test_controller_by_chip() {
        assert!(usb_port(0x1A86, 0x7523, None).is_gpib_controller());
        assert!(!usb_port(0x10C4, 0xEA60, Some("CP2102 USB to UART")).is_gpib_controller());
    }

    #[test]
    fn test_non_usb_port() {
        let info = SerialPortInfo::from_serialport("COM1".to_string(), &SerialPortType::Unknown);
        assert!(!info.is_gpib_controller());
    }

    #[test]
    fn test_skip_patterns() {
        let scanner = PortScanner::new();
        let mut info = usb_port(0x0403, 0x6001, None);
        info.port = "/dev/cu.Bluetooth-Incoming-Port".to_string();
        assert!(scanner.should_skip_port(&info));
    }
}
