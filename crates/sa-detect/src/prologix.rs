//! Prologix GPIB-USB controller transport
//!
//! The controller is a serial device. Lines starting with `++` configure the
//! controller itself; everything else is forwarded to the addressed
//! instrument. Reads are explicit (`++read eoi`) unless auto-read is enabled.
//!
//! Payload bytes that the controller would interpret (CR, LF, ESC and `+`)
//! are escaped with ESC before being sent.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use sa_protocol::{EosMode, LinkSettings, Transport, TransportError};
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, trace, warn};

const ESC: u8 = 0x1B;

/// Controller-side configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrologixConfig {
    /// Serial port used when the address does not name one
    pub port: Option<String>,
    /// Serial baud rate (ignored by USB controllers, required by AR488 clones)
    pub baud_rate: u32,
    /// Inter-character gap that ends a binary read
    pub read_dropout_ms: u64,
}

impl Default for PrologixConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            read_dropout_ms: 50,
        }
    }
}

/// Split a link address into serial port and GPIB primary address
///
/// Accepts `port@addr`, `addr`, or `port` (address 18).
pub fn parse_address(
    address: &str,
    default_port: Option<&str>,
) -> Result<(String, u8), TransportError> {
    let bad = |reason: &str| TransportError::OpenFailed {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let (port, gpib) = match address.rsplit_once('@') {
        Some((port, gpib)) => (Some(port.to_string()), Some(gpib)),
        None if address.chars().all(|c| c.is_ascii_digit()) && !address.is_empty() => {
            (None, Some(address))
        }
        None => (Some(address.to_string()), None),
    };

    let gpib = match gpib {
        Some(text) => text
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|a| *a <= 30)
            .ok_or_else(|| bad("GPIB address must be 0-30"))?,
        None => 18,
    };

    let port = port
        .filter(|p| !p.is_empty())
        .or_else(|| default_port.map(str::to_string))
        .ok_or_else(|| bad("no serial port configured"))?;

    Ok((port, gpib))
}

/// Escape payload bytes the controller would otherwise interpret
pub fn escape(command: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(command.len() + 1);
    for &b in command.as_bytes() {
        if matches!(b, b'\r' | b'\n' | ESC | b'+') {
            out.push(ESC);
        }
        out.push(b);
    }
    out.push(b'\n');
    out
}

fn eos_code(mode: EosMode) -> u8 {
    match mode {
        EosMode::CrLf => 0,
        EosMode::Cr => 1,
        EosMode::Lf => 2,
        EosMode::EoiOnly => 3,
    }
}

/// Read until the terminator (if any), `max_len` bytes, or a dropout
///
/// A dropout is a read that times out or returns nothing. A dropout ends the
/// read once data has arrived; before that it is retried until `deadline`.
fn read_until<R: Read + ?Sized>(
    reader: &mut R,
    max_len: usize,
    terminator: Option<u8>,
    deadline: Instant,
) -> Result<Vec<u8>, TransportError> {
    let mut out = Vec::with_capacity(max_len.min(4096));
    let mut chunk = [0u8; 512];
    while out.len() < max_len {
        let want = chunk.len().min(max_len - out.len());
        let dropout = match reader.read(&mut chunk[..want]) {
            Ok(0) => true,
            Ok(n) => {
                out.extend_from_slice(&chunk[..n]);
                if terminator.is_some_and(|t| chunk[..n].contains(&t)) {
                    break;
                }
                false
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => true,
            Err(e) => return Err(TransportError::Io(e.to_string())),
        };

        if dropout {
            // The controller stops sending after EOI
            if !out.is_empty() {
                break;
            }
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout("read".into()));
            }
        }
    }
    Ok(out)
}

/// Transport over a Prologix-compatible GPIB-USB controller
pub struct PrologixTransport {
    config: PrologixConfig,
    port: Option<Box<dyn SerialPort>>,
    timeout: Duration,
    dropout: Duration,
    eos: EosMode,
    auto_read: bool,
}

impl PrologixTransport {
    /// Create a closed transport
    pub fn new(config: PrologixConfig) -> Self {
        let dropout = Duration::from_millis(config.read_dropout_ms);
        Self {
            config,
            port: None,
            timeout: LinkSettings::default().timeout,
            dropout,
            eos: EosMode::default(),
            auto_read: false,
        }
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::NotOpen)
    }

    /// Send a controller command (`++...`)
    fn controller(&mut self, command: &str) -> Result<(), TransportError> {
        trace!("-> {}", command);
        let port = self.port()?;
        port.write_all(command.as_bytes())
            .and_then(|_| port.write_all(b"\n"))
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    /// Read until the terminator (if any), `max_len` bytes, or a dropout
    fn read_raw(&mut self, max_len: usize, terminator: Option<u8>) -> Result<Vec<u8>, TransportError> {
        if !self.auto_read {
            self.controller("++read eoi")?;
        }

        let deadline = Instant::now() + self.timeout;
        let dropout = self.dropout;
        let port = self.port()?;
        port.set_timeout(dropout)
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let out = read_until(port, max_len, terminator, deadline)?;
        trace!("<- {} bytes", out.len());
        Ok(out)
    }
}

impl Transport for PrologixTransport {
    fn open(&mut self, settings: &LinkSettings) -> Result<(), TransportError> {
        let (port_name, gpib) = parse_address(&settings.address, self.config.port.as_deref())?;
        debug!("Opening {} (GPIB address {})", port_name, gpib);

        let port = serialport::new(&port_name, self.config.baud_rate)
            .timeout(self.dropout)
            .open()
            .map_err(|e| TransportError::OpenFailed {
                address: settings.address.clone(),
                reason: e.to_string(),
            })?;

        self.port = Some(port);
        self.timeout = settings.timeout;

        let read_tmo = settings.timeout.as_millis().clamp(1, 3000);
        let setup = [
            "++mode 1".to_string(),
            "++auto 0".to_string(),
            "++eoi 1".to_string(),
            format!("++eos {}", eos_code(self.eos)),
            format!("++read_tmo_ms {}", read_tmo),
            format!("++addr {}", gpib),
        ];
        for command in &setup {
            self.controller(command)?;
        }
        self.auto_read = false;

        if settings.clear {
            self.controller("++clr")?;
        }
        self.flush_receive_buffers()
    }

    fn close(&mut self, go_to_local: bool) {
        if go_to_local && self.port.is_some() {
            if let Err(e) = self.controller("++loc") {
                warn!("Failed to return instrument to local: {}", e);
            }
        }
        self.port = None;
    }

    fn write(&mut self, command: &str) -> Result<(), TransportError> {
        debug!("-> {}", command);
        let bytes = escape(command);
        self.port()?
            .write_all(&bytes)
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn read_ascii(&mut self, max_len: usize) -> Result<String, TransportError> {
        let terminator = match self.eos {
            EosMode::Cr => Some(b'\r'),
            EosMode::Lf | EosMode::CrLf => Some(b'\n'),
            EosMode::EoiOnly => None,
        };
        let raw = self.read_raw(max_len, terminator)?;
        let reply = String::from_utf8_lossy(&raw).into_owned();
        debug!("<- {:?}", reply.trim_end());
        Ok(reply)
    }

    fn read_binary(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        self.read_raw(max_len, None)
    }

    fn serial_poll(&mut self) -> Result<u8, TransportError> {
        self.controller("++spoll")?;
        let auto_read = std::mem::replace(&mut self.auto_read, true);
        let reply = self.read_raw(16, Some(b'\n'));
        self.auto_read = auto_read;

        let reply = String::from_utf8_lossy(&reply?).trim().to_string();
        trace!("spoll <- {:?}", reply);
        reply
            .parse::<u8>()
            .map_err(|_| TransportError::Bus(format!("bad serial poll reply {:?}", reply)))
    }

    fn set_eos_mode(&mut self, mode: EosMode) -> Result<(), TransportError> {
        self.eos = mode;
        self.controller(&format!("++eos {}", eos_code(mode)))
    }

    fn set_read_dropout(&mut self, dropout: Duration) -> Result<(), TransportError> {
        self.dropout = dropout;
        Ok(())
    }

    fn flush_receive_buffers(&mut self) -> Result<(), TransportError> {
        self.port()?
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn set_auto_read(&mut self, enabled: bool) -> Result<(), TransportError> {
        self.auto_read = enabled;
        self.controller(if enabled { "++auto 1" } else { "++auto 0" })
    }
}

impl Drop for PrologixTransport {
    fn drop(&mut self) {
        self.close(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("/dev/ttyUSB0@7", None).unwrap(),
            ("/dev/ttyUSB0".to_string(), 7)
        );
        assert_eq!(
            parse_address("18", Some("COM4")).unwrap(),
            ("COM4".to_string(), 18)
        );
        assert_eq!(
            parse_address("COM3", None).unwrap(),
            ("COM3".to_string(), 18)
        );
    }

    #[test]
    fn test_parse_address_errors() {
        assert!(parse_address("18", None).is_err());
        assert!(parse_address("COM3@31", None).is_err());
        assert!(parse_address("COM3@x", None).is_err());
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("RL?"), b"RL?\n".to_vec());
        assert_eq!(escape("A+B"), vec![b'A', ESC, b'+', b'B', b'\n']);
    }

    /// Reader that hands out fixed chunks, then reports end of stream forever
    struct Chunks(Vec<Vec<u8>>);

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.0.is_empty() {
                return Ok(0);
            }
            let chunk = self.0.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    fn soon() -> Instant {
        Instant::now() + Duration::from_millis(20)
    }

    #[test]
    fn test_read_stops_at_terminator() {
        let mut reader = Chunks(vec![b"-1".to_vec(), b"0\n".to_vec(), b"junk".to_vec()]);
        let out = read_until(&mut reader, 64, Some(b'\n'), soon()).unwrap();
        assert_eq!(out, b"-10\n");
    }

    #[test]
    fn test_read_ends_on_dropout_after_data() {
        let mut reader = Chunks(vec![vec![1, 2, 3]]);
        let out = read_until(&mut reader, 64, None, soon()).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn test_endless_empty_reads_time_out() {
        let started = Instant::now();
        let mut reader = Chunks(Vec::new());
        let err = read_until(&mut reader, 64, None, soon()).unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_closed_transport() {
        let mut transport = PrologixTransport::new(PrologixConfig::default());
        assert_eq!(transport.write("ID?"), Err(TransportError::NotOpen));
        assert_eq!(transport.serial_poll(), Err(TransportError::NotOpen));
    }

    proptest! {
        #[test]
        fn prop_escaped_commands_have_no_bare_controls(command in "[ -~\r\n\x1b]{0,64}") {
            let escaped = escape(&command);
            prop_assert_eq!(escaped.last(), Some(&b'\n'));

            let body = &escaped[..escaped.len() - 1];
            let mut unescaped = Vec::new();
            let mut i = 0;
            while i < body.len() {
                if body[i] == ESC {
                    prop_assert!(i + 1 < body.len());
                    i += 1;
                } else {
                    prop_assert!(!matches!(body[i], b'\r' | b'\n' | b'+'));
                }
                unescaped.push(body[i]);
                i += 1;
            }
            prop_assert_eq!(unescaped, command.as_bytes().to_vec());
        }

        #[test]
        fn prop_port_and_address_are_split(port in "COM[0-9]{1,2}|/dev/ttyUSB[0-9]", gpib in 0u8..=30) {
            let (parsed_port, parsed_gpib) =
                parse_address(&format!("{}@{}", port, gpib), None).unwrap();
            prop_assert_eq!(parsed_port, port);
            prop_assert_eq!(parsed_gpib, gpib);
        }
    }
}
