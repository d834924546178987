//! Bus transport seam
//!
//! A [`Transport`] is a blocking command/response link to one instrument:
//! one command outstanding, one read, never pipelined. The GPIB driver (or a
//! simulator) implements it; the acquisition engine only consumes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Default maximum length of an ASCII reply
pub const DEFAULT_REPLY_LEN: usize = 256;

/// Errors raised by a transport
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The link is not open
    #[error("transport not open")]
    NotOpen,

    /// The instrument did not answer within the link timeout
    #[error("timeout during {0}")]
    Timeout(String),

    /// Failed to open the link
    #[error("failed to open {address}: {reason}")]
    OpenFailed { address: String, reason: String },

    /// I/O error on the link
    #[error("I/O error: {0}")]
    Io(String),

    /// Bus controller reported an error
    #[error("bus error: {0}")]
    Bus(String),
}

/// End-of-string handling for reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EosMode {
    /// Terminate on CR+LF
    CrLf,
    /// Terminate on CR
    Cr,
    /// Terminate on LF
    #[default]
    Lf,
    /// Terminate on EOI only (binary transfers)
    EoiOnly,
}

/// Parameters for opening a link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSettings {
    /// Bus address (GPIB primary address, optionally `port@address`)
    pub address: String,
    /// Per-read timeout
    pub timeout: Duration,
    /// Send a device clear after opening
    pub clear: bool,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            address: "18".to_string(),
            timeout: Duration::from_millis(3000),
            clear: true,
        }
    }
}

/// Blocking command/response link to one instrument
pub trait Transport {
    /// Open the link
    fn open(&mut self, settings: &LinkSettings) -> Result<(), TransportError>;

    /// Close the link, optionally returning the instrument to local control
    fn close(&mut self, go_to_local: bool);

    /// Send a command without reading a reply
    fn write(&mut self, command: &str) -> Result<(), TransportError>;

    /// Read an ASCII reply of at most `max_len` bytes
    fn read_ascii(&mut self, max_len: usize) -> Result<String, TransportError>;

    /// Read a binary reply of at most `max_len` bytes
    fn read_binary(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError>;

    /// Serial-poll the instrument and return its status byte
    fn serial_poll(&mut self) -> Result<u8, TransportError>;

    /// Send a command and read its ASCII reply
    fn query(&mut self, command: &str) -> Result<String, TransportError> {
        self.write(command)?;
        self.read_ascii(DEFAULT_REPLY_LEN)
    }

    /// Select end-of-string handling
    fn set_eos_mode(&mut self, _mode: EosMode) -> Result<(), TransportError> {
        Ok(())
    }

    /// Set the inter-character dropout for serial-attached controllers
    fn set_read_dropout(&mut self, _dropout: Duration) -> Result<(), TransportError> {
        Ok(())
    }

    /// Discard anything buffered on the receive side
    fn flush_receive_buffers(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Enable or disable automatic read-after-write
    fn set_auto_read(&mut self, _enabled: bool) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, settings: &LinkSettings) -> Result<(), TransportError> {
        (**self).open(settings)
    }

    fn close(&mut self, go_to_local: bool) {
        (**self).close(go_to_local)
    }

    fn write(&mut self, command: &str) -> Result<(), TransportError> {
        (**self).write(command)
    }

    fn read_ascii(&mut self, max_len: usize) -> Result<String, TransportError> {
        (**self).read_ascii(max_len)
    }

    fn read_binary(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read_binary(max_len)
    }

    fn serial_poll(&mut self) -> Result<u8, TransportError> {
        (**self).serial_poll()
    }

    fn query(&mut self, command: &str) -> Result<String, TransportError> {
        (**self).query(command)
    }

    fn set_eos_mode(&mut self, mode: EosMode) -> Result<(), TransportError> {
        (**self).set_eos_mode(mode)
    }

    fn set_read_dropout(&mut self, dropout: Duration) -> Result<(), TransportError> {
        (**self).set_read_dropout(dropout)
    }

    fn flush_receive_buffers(&mut self) -> Result<(), TransportError> {
        (**self).flush_receive_buffers()
    }

    fn set_auto_read(&mut self, enabled: bool) -> Result<(), TransportError> {
        (**self).set_auto_read(enabled)
    }
}

/// Cancellation signal shared between a caller and a blocking acquisition
///
/// Every polling loop in the engine checks the token once per iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a new, un-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation request
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
