//! Error types for controller discovery and instrument identification

use std::time::Duration;

use sa_protocol::{Family, TransportError};
use thiserror::Error;

/// Errors that can occur during detection
#[derive(Debug, Error)]
pub enum DetectError {
    /// The family has no identity query to send
    #[error("{0} instruments cannot be identified over the bus")]
    NoIdentityQuery(&'static str),

    /// No usable identity reply arrived in time
    #[error("no reply to {query} within {waited:?}")]
    Timeout { query: &'static str, waited: Duration },

    /// The identity reply matched no known dialect
    #[error("unrecognized {} instrument: {id:?}", family.name())]
    Unrecognized { family: Family, id: String },

    /// The caller cancelled identification
    #[error("identification cancelled")]
    Cancelled,

    /// Transport error while identifying
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Serial port enumeration failed
    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),
}
