//! Error types for connection and acquisition

use std::time::Duration;

use sa_detect::DetectError;
use sa_protocol::{ParseError, ProtocolError, TransportError};
use thiserror::Error;

use crate::state::ConnectionState;

/// Coarse classification that decides how a failure is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The instrument cannot be brought to `Ready`; never retried automatically
    ConnectFailure,
    /// The instrument sent something undecodable; the fetch yields no points
    ProtocolViolation,
    /// The bus link failed
    TransportFailure,
    /// The sweep did not finish in time; the fetch yields no points and the handle stays ready
    Timeout,
    /// The caller cancelled; not recorded as an error
    UserCancellation,
}

/// Errors that can occur while connecting or acquiring
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Identification failed
    #[error("identification failed: {0}")]
    Identify(#[from] DetectError),

    /// The display is in linear mode, which makes traces undecodable
    #[error("{0} is in linear display mode; select a log scale")]
    LinearDisplay(&'static str),

    /// Start and stop frequency do not form a positive, finite span
    #[error("zero span ({start_hz} Hz to {stop_hz} Hz) is not supported")]
    ZeroSpan { start_hz: f64, stop_hz: f64 },

    /// A value never settled within the allowed time
    #[error("{what} did not settle within {waited:?}")]
    SettleTimeout { what: String, waited: Duration },

    /// The sweep never reported completion
    #[error("sweep did not complete within {0:?}")]
    SweepTimeout(Duration),

    /// The instrument reports a point count this dialect cannot decode
    #[error("unsupported trace point count {0}")]
    UnsupportedPointCount(usize),

    /// The self-configuring receiver was selected but none is attached
    #[error("no direct-digital receiver attached")]
    NoReceiver,

    /// Operation requires a different connection state
    #[error("instrument is {0:?}, not ready")]
    NotReady(ConnectionState),

    /// Reply or trace block could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Decoded trace does not fit the connection
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Bus transport error
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The caller cancelled the operation
    #[error("cancelled")]
    Cancelled,
}

impl AcquireError {
    /// Classify the error
    pub fn class(&self) -> ErrorClass {
        match self {
            AcquireError::Identify(DetectError::Cancelled) | AcquireError::Cancelled => {
                ErrorClass::UserCancellation
            }
            AcquireError::Identify(DetectError::Transport(_) | DetectError::SerialPort(_))
            | AcquireError::Transport(_) => ErrorClass::TransportFailure,
            AcquireError::SweepTimeout(_) => ErrorClass::Timeout,
            AcquireError::Parse(_) | AcquireError::Protocol(_) => ErrorClass::ProtocolViolation,
            AcquireError::Identify(_)
            | AcquireError::LinearDisplay(_)
            | AcquireError::ZeroSpan { .. }
            | AcquireError::SettleTimeout { .. }
            | AcquireError::UnsupportedPointCount(_)
            | AcquireError::NoReceiver
            | AcquireError::NotReady(_) => ErrorClass::ConnectFailure,
        }
    }

    /// Whether the error came from the caller cancelling
    pub fn is_cancelled(&self) -> bool {
        self.class() == ErrorClass::UserCancellation
    }
}

/// Errors from parsing an options string
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptionsError {
    /// Token does not start with `-`
    #[error("expected -flag or -key:value, found {0:?}")]
    Malformed(String),

    /// Unknown option name
    #[error("unknown option -{0}")]
    UnknownOption(String),

    /// Option requires a value
    #[error("option -{0} requires a value")]
    MissingValue(&'static str),

    /// Option value could not be parsed
    #[error("invalid value {value:?} for -{option}")]
    InvalidValue { option: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        assert_eq!(
            AcquireError::LinearDisplay("HP 8566/8568").class(),
            ErrorClass::ConnectFailure
        );
        assert_eq!(
            AcquireError::Parse(ParseError::ChecksumMismatch { residue: 1 }).class(),
            ErrorClass::ProtocolViolation
        );
        assert_eq!(
            AcquireError::Transport(TransportError::NotOpen).class(),
            ErrorClass::TransportFailure
        );
        assert_eq!(
            AcquireError::SweepTimeout(Duration::from_secs(30)).class(),
            ErrorClass::Timeout
        );
        assert!(AcquireError::Identify(DetectError::Cancelled).is_cancelled());
        assert_eq!(
            AcquireError::Identify(DetectError::Timeout {
                query: "ID?",
                waited: Duration::from_secs(5)
            })
            .class(),
            ErrorClass::ConnectFailure
        );
    }
}
