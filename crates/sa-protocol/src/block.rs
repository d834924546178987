//! Fixed-width binary trace blocks
//!
//! Legacy HP, Advantest and Anritsu analyzers dump a trace as a block of
//! exactly `points` words with no header. Each word is a display code that
//! maps linearly onto the graticule:
//!
//! ```text
//! dBm = min_dbm + (code + grating_offset) * (max_dbm - min_dbm) / code_range
//! ```
//!
//! `code_range` and `grating_offset` are fixed per model.

use crate::error::ParseError;

/// Width of a single sample word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WordWidth {
    /// One byte per sample
    Bits8,
    /// Two bytes per sample
    Bits16,
}

impl WordWidth {
    /// Size of one word in bytes
    pub fn bytes(&self) -> usize {
        match self {
            WordWidth::Bits8 => 1,
            WordWidth::Bits16 => 2,
        }
    }
}

/// Byte order of multi-byte words on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteOrder {
    /// Most significant byte first (GPIB default)
    BigEndian,
    /// Least significant byte first (`:FORM:BORD SWAP`)
    LittleEndian,
}

/// Layout and scaling of a fixed-width trace block
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockFormat {
    /// Word width
    pub width: WordWidth,
    /// Word byte order
    pub order: ByteOrder,
    /// Number of codes spanning the full graticule
    pub code_range: f64,
    /// Offset added to each code before scaling (bottom graticule line)
    pub grating_offset: f64,
}

impl BlockFormat {
    /// 16-bit big-endian block
    pub const fn words(code_range: f64, grating_offset: f64) -> Self {
        Self {
            width: WordWidth::Bits16,
            order: ByteOrder::BigEndian,
            code_range,
            grating_offset,
        }
    }

    /// 8-bit block
    pub const fn bytes(code_range: f64, grating_offset: f64) -> Self {
        Self {
            width: WordWidth::Bits8,
            order: ByteOrder::BigEndian,
            code_range,
            grating_offset,
        }
    }

    /// Number of bytes a block of `points` samples occupies
    pub fn byte_len(&self, points: usize) -> usize {
        points * self.width.bytes()
    }

    /// Split a raw block into display codes
    pub fn codes(&self, raw: &[u8], points: usize) -> Result<Vec<u16>, ParseError> {
        let expected = self.byte_len(points);
        if raw.len() < expected {
            return Err(ParseError::ShortRead {
                expected,
                actual: raw.len(),
            });
        }

        let raw = &raw[..expected];
        let codes = match self.width {
            WordWidth::Bits8 => raw.iter().map(|&b| u16::from(b)).collect(),
            WordWidth::Bits16 => raw
                .chunks_exact(2)
                .map(|w| match self.order {
                    ByteOrder::BigEndian => u16::from_be_bytes([w[0], w[1]]),
                    ByteOrder::LittleEndian => u16::from_le_bytes([w[0], w[1]]),
                })
                .collect(),
        };
        Ok(codes)
    }

    /// Decode a raw block into calibrated amplitudes
    pub fn decode(
        &self,
        raw: &[u8],
        points: usize,
        min_dbm: f64,
        max_dbm: f64,
    ) -> Result<Vec<f64>, ParseError> {
        let span = max_dbm - min_dbm;
        Ok(self
            .codes(raw, points)?
            .into_iter()
            .map(|code| min_dbm + (f64::from(code) + self.grating_offset) * span / self.code_range)
            .collect())
    }

    /// Convert an amplitude back to the nearest display code
    pub fn code_for(&self, dbm: f64, min_dbm: f64, max_dbm: f64) -> u16 {
        let code = (dbm - min_dbm) * self.code_range / (max_dbm - min_dbm) - self.grating_offset;
        let max = match self.width {
            WordWidth::Bits8 => f64::from(u8::MAX),
            WordWidth::Bits16 => f64::from(u16::MAX),
        };
        code.round().clamp(0.0, max) as u16
    }

    /// Encode display codes into a raw block
    pub fn encode(&self, codes: &[u16]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len(codes.len()));
        for &code in codes {
            match self.width {
                WordWidth::Bits8 => out.push(code.min(u16::from(u8::MAX)) as u8),
                WordWidth::Bits16 => match self.order {
                    ByteOrder::BigEndian => out.extend_from_slice(&code.to_be_bytes()),
                    ByteOrder::LittleEndian => out.extend_from_slice(&code.to_le_bytes()),
                },
            }
        }
        out
    }
}
