//! IEEE-488.2 definite-length arbitrary blocks
//!
//! # Format
//! ```text
//! #<n><len><data...>[\n]
//! ```
//!
//! - `n`: one ASCII digit, the number of digits in `len` (1-9)
//! - `len`: `n` ASCII digits, the number of data bytes
//! - `#0` introduces an indefinite-length block terminated by EOI; the
//!   trailing newline (if any) is not part of the data
//!
//! SCPI analyzers send trace data as `REAL,32` floats in dBm or `INT,32`
//! integers in milli-dBm.

use crate::block::ByteOrder;
use crate::dialect::{ScpiEncoding, ScpiFormat};
use crate::error::ParseError;

/// Parsed block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Bytes occupied by the header itself
    pub header_len: usize,
    /// Data bytes announced by the header (`None` for `#0`)
    pub data_len: Option<usize>,
}

/// Parse the `#<n><len>` header at the start of `buf`
pub fn parse_header(buf: &[u8]) -> Result<BlockHeader, ParseError> {
    // Some instruments emit whitespace before the block
    let lead = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
    let buf = &buf[lead..];

    match buf.first() {
        Some(b'#') => {}
        Some(&b) => {
            return Err(ParseError::InvalidHeader(format!(
                "expected '#', found 0x{:02X}",
                b
            )))
        }
        None => return Err(ParseError::InvalidHeader("empty block".into())),
    }

    let digits = match buf.get(1) {
        Some(&d) if d.is_ascii_digit() => usize::from(d - b'0'),
        Some(&d) => {
            return Err(ParseError::InvalidHeader(format!(
                "non-digit length count 0x{:02X}",
                d
            )))
        }
        None => return Err(ParseError::InvalidHeader("truncated header".into())),
    };

    if digits == 0 {
        return Ok(BlockHeader {
            header_len: lead + 2,
            data_len: None,
        });
    }

    let field = buf
        .get(2..2 + digits)
        .ok_or_else(|| ParseError::InvalidHeader("truncated length field".into()))?;
    if !field.iter().all(u8::is_ascii_digit) {
        return Err(ParseError::InvalidHeader(format!(
            "non-digit length field {:?}",
            String::from_utf8_lossy(field)
        )));
    }

    let data_len = field
        .iter()
        .fold(0usize, |acc, &d| acc * 10 + usize::from(d - b'0'));

    Ok(BlockHeader {
        header_len: lead + 2 + digits,
        data_len: Some(data_len),
    })
}

/// Return the data portion of a block, checking it is complete
pub fn block_data(buf: &[u8]) -> Result<&[u8], ParseError> {
    let header = parse_header(buf)?;
    let rest = &buf[header.header_len..];

    match header.data_len {
        Some(len) if rest.len() < len => {
            tracing::warn!("Block announced {} bytes, received {}", len, rest.len());
            Err(ParseError::ShortRead {
                expected: len,
                actual: rest.len(),
            })
        }
        Some(len) => Ok(&rest[..len]),
        None => Ok(rest.strip_suffix(b"\n").unwrap_or(rest)),
    }
}

/// Wrap data in a definite-length block header
pub fn encode_block(data: &[u8]) -> Vec<u8> {
    let len = data.len().to_string();
    let mut out = Vec::with_capacity(2 + len.len() + data.len() + 1);
    out.push(b'#');
    out.extend_from_slice(len.len().to_string().as_bytes());
    out.extend_from_slice(len.as_bytes());
    out.extend_from_slice(data);
    out.push(b'\n');
    out
}

/// Total block length for a given data length, including header and newline
pub fn encoded_len(data_len: usize) -> usize {
    let digits = data_len.to_string().len();
    2 + digits + data_len + 1
}

/// Decode block data into dBm values
pub fn decode_samples(data: &[u8], format: ScpiFormat) -> Result<Vec<f64>, ParseError> {
    if data.len() % 4 != 0 {
        tracing::trace!("Ragged sample block of {} bytes", data.len());
        return Err(ParseError::InvalidBlock(format!(
            "{} bytes is not a whole number of 32-bit samples",
            data.len()
        )));
    }

    Ok(data
        .chunks_exact(4)
        .map(|w| {
            let bytes = [w[0], w[1], w[2], w[3]];
            match (format.encoding, format.order) {
                (ScpiEncoding::Real32, ByteOrder::BigEndian) => f64::from(f32::from_be_bytes(bytes)),
                (ScpiEncoding::Real32, ByteOrder::LittleEndian) => {
                    f64::from(f32::from_le_bytes(bytes))
                }
                (ScpiEncoding::Int32Milli, ByteOrder::BigEndian) => {
                    f64::from(i32::from_be_bytes(bytes)) / 1000.0
                }
                (ScpiEncoding::Int32Milli, ByteOrder::LittleEndian) => {
                    f64::from(i32::from_le_bytes(bytes)) / 1000.0
                }
            }
        })
        .collect())
}

/// Encode dBm values into block data
pub fn encode_samples(values: &[f64], format: ScpiFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for &v in values {
        let bytes = match (format.encoding, format.order) {
            (ScpiEncoding::Real32, ByteOrder::BigEndian) => (v as f32).to_be_bytes(),
            (ScpiEncoding::Real32, ByteOrder::LittleEndian) => (v as f32).to_le_bytes(),
            (ScpiEncoding::Int32Milli, ByteOrder::BigEndian) => {
                ((v * 1000.0).round() as i32).to_be_bytes()
            }
            (ScpiEncoding::Int32Milli, ByteOrder::LittleEndian) => {
                ((v * 1000.0).round() as i32).to_le_bytes()
            }
        };
        out.extend_from_slice(&bytes);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const REAL_LE: ScpiFormat = ScpiFormat {
        encoding: ScpiEncoding::Real32,
        order: ByteOrder::LittleEndian,
    };

    #[test]
    fn test_round_trip_sizes() {
        for n in [0usize, 1, 1000] {
            let data: Vec<u8> = (0..n).map(|i| (i % 256) as u8).collect();
            let block = encode_block(&data);
            assert_eq!(block.len(), encoded_len(n));
            assert_eq!(block_data(&block).unwrap(), data.as_slice());
        }
    }

    #[test]
    fn test_header_fields() {
        let header = parse_header(b"#42000").unwrap();
        assert_eq!(header.header_len, 6);
        assert_eq!(header.data_len, Some(2000));
    }

    #[test]
    fn test_non_digit_length_fails() {
        assert!(matches!(
            parse_header(b"#3a00xyz"),
            Err(ParseError::InvalidHeader(_))
        ));
        assert!(matches!(
            parse_header(b"#x100"),
            Err(ParseError::InvalidHeader(_))
        ));
        assert!(matches!(
            parse_header(b"100"),
            Err(ParseError::InvalidHeader(_))
        ));
        assert!(matches!(parse_header(b""), Err(ParseError::InvalidHeader(_))));
        assert!(matches!(
            parse_header(b"#512"),
            Err(ParseError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_short_block() {
        assert_eq!(
            block_data(b"#210abc"),
            Err(ParseError::ShortRead {
                expected: 10,
                actual: 3
            })
        );
    }

    #[test]
    fn test_indefinite_block() {
        assert_eq!(block_data(b"#0abcd\n").unwrap(), b"abcd");
    }

    #[test]
    fn test_leading_whitespace() {
        assert_eq!(block_data(b"\r\n#14abcd").unwrap(), b"abcd");
    }

    #[test]
    fn test_real32_both_orders() {
        let values = [-10.5, -87.25, 0.0];
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            let format = ScpiFormat {
                encoding: ScpiEncoding::Real32,
                order,
            };
            let data = encode_samples(&values, format);
            assert_eq!(decode_samples(&data, format).unwrap(), values);
        }
    }

    #[test]
    fn test_int32_milli() {
        let format = ScpiFormat {
            encoding: ScpiEncoding::Int32Milli,
            order: ByteOrder::BigEndian,
        };
        let data = (-12_345i32).to_be_bytes();
        assert_eq!(decode_samples(&data, format).unwrap(), vec![-12.345]);
    }

    #[test]
    fn test_ragged_data_rejected() {
        assert!(decode_samples(&[0, 0, 0], REAL_LE).is_err());
    }

    proptest! {
        #[test]
        fn prop_block_round_trip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let block = encode_block(&data);
            prop_assert_eq!(block_data(&block).unwrap(), data.as_slice());
        }

        #[test]
        fn prop_truncated_block_is_short_read(
            data in proptest::collection::vec(any::<u8>(), 1..512),
            cut in 1usize..512,
        ) {
            let block = encode_block(&data);
            let cut = cut.min(data.len());
            // Drop the newline and `cut` data bytes
            let truncated = &block[..block.len() - 1 - cut];
            let is_short_read = matches!(block_data(truncated), Err(ParseError::ShortRead { .. }));
            prop_assert!(is_short_read);
        }
    }
}
