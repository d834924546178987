//! GPIB Controller Detection Library
//!
//! This crate finds GPIB-USB controllers on the serial bus, drives them as a
//! [`Transport`](sa_protocol::Transport), and identifies the analyzer at the
//! other end of the bus.
//!
//! # Example
//!
//! ```rust,no_run
//! use sa_detect::PortScanner;
//!
//! let scanner = PortScanner::new();
//! let ports = scanner.enumerate_ports().unwrap();
//!
//! for port in ports.iter().filter(|p| p.is_gpib_controller()) {
//!     println!("Found controller: {}", port.port);
//! }
//! ```

pub mod error;
pub mod identify;
pub mod prologix;
pub mod scanner;

pub use error::DetectError;
pub use identify::{identify, IdentifyConfig, Identity};
pub use prologix::{PrologixConfig, PrologixTransport};
pub use scanner::{PortScanner, ScannerConfig, SerialPortInfo};
