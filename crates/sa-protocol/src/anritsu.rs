//! Anritsu MS8604A/MS265x/MS266x grammar
//!
//! Anritsu analyzers answer `*IDN?` but otherwise use proprietary mnemonics.
//! `DIV?` reports the log scale in dB/division, or `LIN` in linear mode.
//! The MS8604A dumps a fixed block of display codes; the MS2650/MS2660 frame
//! their dump as an IEEE-488.2 block of milli-dBm integers.

use crate::error::ParseError;
use crate::reply::{parse_number, parse_word};
use crate::VerticalScale;

/// Select single-sweep mode
pub const SINGLE_SWEEP: &str = "SNGLS";
/// Start one sweep and wait for it
pub const TAKE_SWEEP: &str = "TS";
/// Binary output mode
pub const BINARY_MODE: &str = "BIN 1";

/// Reference level query
pub const REFERENCE_LEVEL: &str = "RLV?";
/// Scale query (`LIN` or dB/division)
pub const SCALE: &str = "DIV?";
/// Start frequency query
pub const START: &str = "STF?";
/// Stop frequency query
pub const STOP: &str = "SOF?";
/// Resolution bandwidth query
pub const RBW: &str = "RBW?";
/// Video bandwidth query
pub const VBW: &str = "VBW?";
/// Sweep time query
pub const SWEEP_TIME: &str = "SWT?";
/// Input attenuation query
pub const ATTENUATION: &str = "ATT?";
/// Averaging count query
pub const AVERAGE: &str = "AVR?";
/// Trace point count query
pub const POINTS: &str = "MPN?";

/// Trace dump query for `points` samples
pub fn trace_dump(points: usize) -> String {
    format!("XMA? 0,{}", points)
}

/// Parse a `DIV?` reply
pub fn parse_scale(reply: &str) -> Result<VerticalScale, ParseError> {
    if parse_word(reply).starts_with("LIN") {
        return Ok(VerticalScale::Linear);
    }
    parse_number(reply).map(VerticalScale::Log)
}
