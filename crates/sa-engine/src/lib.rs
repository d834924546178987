//! Spectrum Analyzer Acquisition Engine
//!
//! This crate turns a bus [`Transport`](sa_protocol::Transport) into
//! calibrated traces:
//!
//! - **InstrumentHandle**: connect/identify state machine and single-sweep fetch
//! - **Drivers**: one [`DialectDriver`] per vendor family, parameterised by dialect
//! - **TraceBuffer**: calibrated amplitudes with bucket-center frequencies
//! - **Resampler**: point, spline, average, min and max resampling
//!
//! # Example
//!
//! ```rust
//! use sa_engine::{parse_options, InstrumentHandle};
//! use sa_protocol::Dialect;
//! use sa_sim::VirtualAnalyzer;
//!
//! let mut handle = InstrumentHandle::startup(VirtualAnalyzer::new(Dialect::Hp8566));
//! handle.connect(&parse_options("-family:hp").unwrap()).unwrap();
//!
//! let trace = handle.fetch_trace();
//! assert_eq!(trace.len(), 1001);
//! for (freq_hz, dbm) in trace.points().take(3) {
//!     println!("{},{}", freq_hz, dbm);
//! }
//! ```

pub mod drivers;
pub mod error;
pub mod instrument;
pub mod options;
pub mod resample;
pub mod retry;
pub mod state;
pub mod trace;

pub use drivers::{driver_for, DialectDriver, Link, MAX_TRACE_POINTS};
pub use error::{AcquireError, ErrorClass, OptionsError};
pub use instrument::InstrumentHandle;
pub use options::{parse_options, AcquireOptions, Timing};
pub use resample::{resample, ResampleOp};
pub use retry::{poll_until, Expiry, PollPolicy};
pub use state::{ConnectionState, DialectCache, InstrumentState};
pub use trace::{Peak, TraceBuffer};
