//! Tektronix 49x/271x/278x Protocol Implementation
//!
//! Tektronix analyzers use a header-echoing ASCII grammar (`REFLVL?` is
//! answered with `REFLVL -20.0`) and dump traces as a checksummed binary curve.
//!
//! # Curve Format
//! ```text
//! CURVE CRVID:FULL,% [count_hi] [count_lo] [data ...] [checksum]
//! ```
//!
//! - `count`: big-endian, number of bytes that follow (data + checksum)
//! - `checksum`: chosen so that count bytes + data + checksum sum to 0 mod 256
//!
//! Samples are scaled with the waveform preamble (`WFMPRE?`):
//! `dBm = YZERO + YMULT * (raw - YOFF)`.

use crate::error::ParseError;
use crate::reply::parse_number;
use crate::VerticalScale;

/// Arm a single sweep
pub const SINGLE_SWEEP: &str = "SIGSWP";
/// Block further commands until the armed sweep completes
pub const WAIT: &str = "WAIT";
/// Select binary curve encoding
pub const SELECT_BINARY: &str = "WFMPRE ENCDG:BIN";
/// Curve dump query
pub const CURVE_QUERY: &str = "CURV?";
/// Waveform preamble query
pub const PREAMBLE_QUERY: &str = "WFMPRE?";
/// Reference level query
pub const REFERENCE_LEVEL: &str = "REFLVL?";
/// Vertical display mode query
pub const VERTICAL_DISPLAY: &str = "VRTDSP?";
/// Center frequency query
pub const CENTER: &str = "FREQ?";
/// Span-per-division query
pub const SPAN: &str = "SPAN?";
/// Resolution bandwidth query
pub const RBW: &str = "RESBW?";
/// Video filter query
pub const VBW: &str = "VIDFLT?";
/// RF attenuation query
pub const ATTENUATION: &str = "RFATT?";

/// Horizontal graticule divisions; `SPAN?` reports span per division
pub const HORIZONTAL_DIVISIONS: f64 = 10.0;

/// Curve ID echoed in front of every curve block
pub const CURVE_ECHO: &[u8] = b"CURVE CRVID:FULL,%";

/// Largest curve block any Tektronix model sends
pub const MAX_CURVE_LEN: usize = CURVE_ECHO.len() + 2 + 1024 + 1 + 8;

/// Waveform preamble, cached per connection
#[derive(Debug, Clone, PartialEq)]
pub struct WfmPreamble {
    /// Points per curve (`NR.PT`)
    pub point_count: usize,
    /// Index of the first point (`PT.OFF`)
    pub point_offset: f64,
    /// Frequency step between points (`XINCR`)
    pub x_increment: f64,
    /// dB per raw code (`YMULT`)
    pub gain: f64,
    /// Raw code at the reference line (`YOFF`)
    pub cal_offset: f64,
    /// Amplitude at the reference line (`YZERO`)
    pub zero_ref: f64,
}

impl WfmPreamble {
    /// Parse a `WFMPRE?` reply
    ///
    /// The reply is a header followed by comma-separated `KEY:value` pairs:
    /// `WFMPRE WFID:SWP,ENCDG:BIN,NR.PT:1000,PT.OFF:0,XINCR:1.0E+4,YMULT:0.32,YOFF:250,YZERO:-20`
    pub fn parse(reply: &str) -> Result<Self, ParseError> {
        let body = reply.trim().trim_end_matches(';');
        let body = body
            .strip_prefix("WFMPRE")
            .map(str::trim_start)
            .unwrap_or(body);

        let field = |key: &'static str| -> Result<Option<f64>, ParseError> {
            for pair in body.split(',') {
                if let Some((k, v)) = pair.split_once(':') {
                    if k.trim().eq_ignore_ascii_case(key) {
                        return parse_number(v).map(Some);
                    }
                }
            }
            Ok(None)
        };

        let point_count = field("NR.PT")?.ok_or(ParseError::MissingField("NR.PT"))?;
        if point_count < 1.0 {
            return Err(ParseError::UnexpectedReply(reply.to_string()));
        }

        Ok(Self {
            point_count: point_count as usize,
            point_offset: field("PT.OFF")?.unwrap_or(0.0),
            x_increment: field("XINCR")?.unwrap_or(0.0),
            gain: field("YMULT")?.ok_or(ParseError::MissingField("YMULT"))?,
            cal_offset: field("YOFF")?.ok_or(ParseError::MissingField("YOFF"))?,
            zero_ref: field("YZERO")?.ok_or(ParseError::MissingField("YZERO"))?,
        })
    }

    /// Format the preamble the way an instrument reports it
    pub fn to_reply(&self) -> String {
        format!(
            "WFMPRE WFID:SWP,ENCDG:BIN,NR.PT:{},PT.FMT:Y,PT.OFF:{},XINCR:{:E},YMULT:{},YOFF:{},YZERO:{}",
            self.point_count,
            self.point_offset,
            self.x_increment,
            self.gain,
            self.cal_offset,
            self.zero_ref
        )
    }

    /// Scale raw curve bytes into dBm
    pub fn scale(&self, raw: &[u8], ampl_offset_db: f64) -> Vec<f64> {
        let zero = self.zero_ref + ampl_offset_db;
        raw.iter()
            .map(|&r| zero + self.gain * (f64::from(r) - self.cal_offset))
            .collect()
    }
}

/// Checksum byte for a curve: makes count + data + checksum sum to zero
pub fn checksum(count: u16, data: &[u8]) -> u8 {
    let [hi, lo] = count.to_be_bytes();
    let sum = data
        .iter()
        .fold(hi.wrapping_add(lo), |acc, &b| acc.wrapping_add(b));
    sum.wrapping_neg()
}

/// Extract the raw data bytes from a curve block, validating framing and checksum
pub fn parse_curve(raw: &[u8]) -> Result<&[u8], ParseError> {
    let marker = raw
        .iter()
        .position(|&b| b == b'%')
        .ok_or_else(|| ParseError::InvalidBlock("missing curve marker".into()))?;

    let echo = String::from_utf8_lossy(&raw[..marker]);
    if !echo.to_ascii_uppercase().contains("CURV") {
        return Err(ParseError::InvalidBlock(format!(
            "unexpected curve echo {:?}",
            echo
        )));
    }

    let rest = &raw[marker + 1..];
    if rest.len() < 2 {
        return Err(ParseError::ShortRead {
            expected: 2,
            actual: rest.len(),
        });
    }

    let count = usize::from(u16::from_be_bytes([rest[0], rest[1]]));
    if count == 0 {
        return Err(ParseError::InvalidBlock("zero-length curve".into()));
    }

    let body = &rest[2..];
    if body.len() < count {
        return Err(ParseError::ShortRead {
            expected: count,
            actual: body.len(),
        });
    }

    let residue = rest[..2 + count]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b));
    if residue != 0 {
        tracing::warn!("Curve of {} bytes failed its checksum", count);
        return Err(ParseError::ChecksumMismatch { residue });
    }

    Ok(&body[..count - 1])
}

/// Encode raw data bytes as a curve block
pub fn encode_curve(data: &[u8]) -> Vec<u8> {
    let count = (data.len() + 1) as u16;
    let mut out = Vec::with_capacity(CURVE_ECHO.len() + data.len() + 3);
    out.extend_from_slice(CURVE_ECHO);
    out.extend_from_slice(&count.to_be_bytes());
    out.extend_from_slice(data);
    out.push(checksum(count, data));
    out
}

/// Parse a `VRTDSP?` reply: `VRTDSP LOG:10` or `VRTDSP LIN`
pub fn parse_vertical_display(reply: &str) -> Result<VerticalScale, ParseError> {
    let text = reply.trim().trim_end_matches(';').to_ascii_uppercase();
    let text = text.strip_prefix("VRTDSP").unwrap_or(&text).trim();

    if text.starts_with("LIN") {
        return Ok(VerticalScale::Linear);
    }
    if let Some(db) = text.strip_prefix("LOG") {
        let db = db.trim_start_matches(':').trim();
        return parse_number(db).map(VerticalScale::Log);
    }
    Err(ParseError::UnexpectedReply(reply.to_string()))
}
