//! SCPI analyzer grammar
//!
//! SCPI analyzers share most of their command tree but disagree on a few
//! branches that matter for trace retrieval:
//!
//! - R&S FSE/FSU/FSP report the full vertical range (`:DISP:WIND:TRAC:Y:SCAL?`)
//!   instead of dB/division, and name the trace query `:TRAC? TRACE1`
//! - the Agilent E4406A is a vector signal analyzer; its spectrum lives under
//!   `:FETC:SPEC7?` and its frequency axis is center/span
//! - byte order is selected with `:FORM:BORD SWAP` (little-endian) or `NORM`

use crate::block::ByteOrder;
use crate::dialect::{Dialect, ScpiEncoding, ScpiFormat, Shape};
use crate::error::ParseError;
use crate::reply::{parse_number, parse_word};
use crate::FrequencyQueries;

/// Disable continuous sweep
pub const CONTINUOUS_OFF: &str = ":INIT:CONT OFF";
/// Start one sweep and hold off further commands until it completes
pub const TAKE_SWEEP: &str = ":INIT:IMM;*WAI";
/// Operation-complete query, answered `1` when the sweep is done
pub const OPERATION_COMPLETE: &str = "*OPC?";
/// Clear status
pub const CLEAR_STATUS: &str = "*CLS";

/// How the vertical scale is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleQuery {
    /// dB per division
    PerDivision(&'static str),
    /// Full display range in dB, spread over the graticule
    FullRange(&'static str),
}

/// Command set for one SCPI dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScpiGrammar {
    /// Reference level query
    pub reference_level: &'static str,
    /// Vertical scale query
    pub scale: ScaleQuery,
    /// Display spacing query (`LIN`/`LOG`)
    pub spacing: Option<&'static str>,
    /// Frequency axis queries
    pub frequency: FrequencyQueries,
    /// Trace point count query
    pub points: Option<&'static str>,
    /// Resolution bandwidth query
    pub rbw: &'static str,
    /// Video bandwidth query
    pub vbw: Option<&'static str>,
    /// Sweep time query
    pub sweep_time: Option<&'static str>,
    /// Averaging count query
    pub average: Option<&'static str>,
    /// Input attenuation query
    pub attenuation: Option<&'static str>,
    /// Trace data query
    pub trace_query: &'static str,
}

const START_STOP: FrequencyQueries = FrequencyQueries::StartStop {
    start: ":FREQ:STAR?",
    stop: ":FREQ:STOP?",
};

static GENERIC: ScpiGrammar = ScpiGrammar {
    reference_level: ":DISP:WIND:TRAC:Y:RLEV?",
    scale: ScaleQuery::PerDivision(":DISP:WIND:TRAC:Y:PDIV?"),
    spacing: Some(":DISP:WIND:TRAC:Y:SPAC?"),
    frequency: START_STOP,
    points: Some(":SWE:POIN?"),
    rbw: ":BAND?",
    vbw: Some(":BAND:VID?"),
    sweep_time: Some(":SWE:TIME?"),
    average: Some(":AVER:COUN?"),
    attenuation: Some(":INP:ATT?"),
    trace_query: ":TRAC:DATA? TRACE1",
};

static ROHDE_SCHWARZ: ScpiGrammar = ScpiGrammar {
    reference_level: ":DISP:WIND:TRAC:Y:RLEV?",
    scale: ScaleQuery::FullRange(":DISP:WIND:TRAC:Y:SCAL?"),
    spacing: Some(":DISP:WIND:TRAC:Y:SPAC?"),
    frequency: START_STOP,
    points: None,
    rbw: ":BAND?",
    vbw: Some(":BAND:VID?"),
    sweep_time: Some(":SWE:TIME?"),
    average: Some(":AVER:COUN?"),
    attenuation: Some(":INP:ATT?"),
    trace_query: ":TRAC? TRACE1",
};

static E4406A: ScpiGrammar = ScpiGrammar {
    reference_level: ":DISP:SPEC:WIND:TRAC:Y:RLEV?",
    scale: ScaleQuery::PerDivision(":DISP:SPEC:WIND:TRAC:Y:PDIV?"),
    spacing: None,
    frequency: FrequencyQueries::CenterSpan {
        center: ":FREQ:CENT?",
        span: ":SPEC:FREQ:SPAN?",
    },
    points: Some(":SPEC:FFT:LENG?"),
    rbw: ":SPEC:BAND?",
    vbw: None,
    sweep_time: None,
    average: Some(":SPEC:AVER:COUN?"),
    attenuation: Some(":POW:ATT?"),
    trace_query: ":FETC:SPEC7?",
};

static N9900: ScpiGrammar = ScpiGrammar {
    reference_level: ":DISP:WIND:TRAC:Y:RLEV?",
    scale: ScaleQuery::PerDivision(":DISP:WIND:TRAC:Y:PDIV?"),
    spacing: None,
    frequency: START_STOP,
    points: Some(":SWE:POIN?"),
    rbw: ":BAND?",
    vbw: Some(":BAND:VID?"),
    sweep_time: Some(":SWE:TIME?"),
    average: Some(":AVER:COUN?"),
    attenuation: Some(":POW:ATT?"),
    trace_query: ":TRAC:DATA? TRACE1",
};

/// Command set for an SCPI dialect
pub fn grammar(dialect: Dialect) -> Option<&'static ScpiGrammar> {
    match dialect {
        Dialect::Scpi => Some(&GENERIC),
        Dialect::RsFse | Dialect::RsFsu | Dialect::RsFsp => Some(&ROHDE_SCHWARZ),
        Dialect::AgilentE4406a => Some(&E4406A),
        Dialect::AgilentN9900 => Some(&N9900),
        _ => None,
    }
}

/// Block format of a dialect that transfers IEEE-488.2 blocks
pub fn block_format(dialect: Dialect) -> Option<ScpiFormat> {
    match dialect.caps().shape {
        Shape::ScpiBlock(format) => Some(format),
        _ => None,
    }
}

/// Commands that select the binary trace format
pub fn format_commands(format: ScpiFormat) -> [&'static str; 2] {
    let encoding = match format.encoding {
        ScpiEncoding::Real32 => ":FORM REAL,32",
        ScpiEncoding::Int32Milli => ":FORM INT,32",
    };
    let order = match format.order {
        ByteOrder::LittleEndian => ":FORM:BORD SWAP",
        ByteOrder::BigEndian => ":FORM:BORD NORM",
    };
    [encoding, order]
}

/// Convert a scale reply to dB per division
pub fn db_per_division(
    scale: ScaleQuery,
    reply: &str,
    division_count: u32,
) -> Result<f64, ParseError> {
    let value = parse_number(reply)?;
    match scale {
        ScaleQuery::PerDivision(_) => Ok(value),
        ScaleQuery::FullRange(_) => Ok(value / f64::from(division_count.max(1))),
    }
}

/// Whether a `SPAC?` reply selects a linear display
pub fn is_linear_spacing(reply: &str) -> bool {
    parse_word(reply).starts_with("LIN")
}
