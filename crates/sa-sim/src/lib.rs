//! Spectrum Analyzer Simulation Library
//!
//! This crate provides stand-ins for bus hardware so the acquisition engine
//! can be exercised without an instrument on the bench:
//!
//! - **ScriptedTransport**: answers queries from a fixed script and records
//!   every command written
//! - **VirtualAnalyzer**: simulates any bus dialect, answering its identity,
//!   configuration queries and trace dumps in that dialect's encoding
//! - **VirtualReceiver**: simulates the USB direct-digital receiver
//!
//! # Example
//!
//! ```rust
//! use sa_protocol::{Dialect, LinkSettings, Transport};
//! use sa_sim::VirtualAnalyzer;
//!
//! let mut analyzer = VirtualAnalyzer::new(Dialect::Hp8566);
//! analyzer.open(&LinkSettings::default()).unwrap();
//!
//! assert_eq!(analyzer.query("ID?").unwrap().trim(), "HP8566B");
//! assert_eq!(analyzer.query("RL?").unwrap().trim(), "-10");
//! ```

pub mod analyzer;
pub mod receiver;
pub mod scripted;

pub use analyzer::{VirtualAnalyzer, VirtualAnalyzerConfig};
pub use receiver::VirtualReceiver;
pub use scripted::ScriptedTransport;
