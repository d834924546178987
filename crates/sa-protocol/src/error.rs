//! Error types for analyzer reply parsing and trace decoding

use thiserror::Error;

/// Errors that can occur while parsing instrument replies or trace blocks
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Buffer is shorter than the framing announced
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// Invalid block structure
    #[error("invalid block: {0}")]
    InvalidBlock(String),

    /// Invalid IEEE-488.2 block header
    #[error("invalid block header: {0}")]
    InvalidHeader(String),

    /// Reply did not contain a usable number
    #[error("invalid number in reply: {0:?}")]
    InvalidNumber(String),

    /// Reply was not in the expected form
    #[error("unexpected reply: {0:?}")]
    UnexpectedReply(String),

    /// Preamble was missing a required field
    #[error("preamble missing field {0}")]
    MissingField(&'static str),

    /// Checksum mismatch
    #[error("checksum mismatch: residue 0x{residue:02X}")]
    ChecksumMismatch { residue: u8 },
}

/// Higher-level protocol errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Parse error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Feature not supported by the selected dialect
    #[error("feature not supported: {0}")]
    UnsupportedFeature(String),

    /// Trace length disagrees with the configured point count
    #[error("trace has {actual} points, expected {expected}")]
    PointCountMismatch { expected: usize, actual: usize },
}
