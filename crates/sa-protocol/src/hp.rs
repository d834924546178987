//! HP/Agilent legacy mnemonic grammar
//!
//! The 8566/8568, 8560, 8590, 70000 and 8569B share a two-letter mnemonic
//! language (`RL?`, `LG?`, `FA?`, `FB?`) and dump traces as fixed blocks of
//! display codes. The network/spectrum analyzers of the 358x line and the
//! 3585 report center+span instead of start/stop and release the trace only
//! after their "sweep complete" status bit is seen by serial poll.
//!
//! `LG?` answers `0` in linear display mode, which makes the trace
//! undecodable; callers must treat it as a hard failure.

use crate::dialect::Dialect;
use crate::FrequencyQueries;

/// Command set for one HP dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpGrammar {
    /// Select single-sweep triggering
    pub single_sweep: &'static str,
    /// Take one sweep and wait for it
    pub take_sweep: &'static str,
    /// Optional word-width selection sent before the dump
    pub width_select: Option<&'static str>,
    /// Trace dump command
    pub trace_dump: &'static str,
    /// Reference level query
    pub reference_level: &'static str,
    /// Log scale query (`0` means linear)
    pub log_scale: &'static str,
    /// Frequency axis queries
    pub frequency: FrequencyQueries,
    /// Resolution bandwidth query
    pub rbw: Option<&'static str>,
    /// Video bandwidth query
    pub vbw: Option<&'static str>,
    /// Sweep time query
    pub sweep_time: Option<&'static str>,
    /// Video averaging count query
    pub video_average: Option<&'static str>,
    /// Input attenuation query
    pub attenuation: Option<&'static str>,
    /// Clear status byte before an armed sweep
    pub clear_status: Option<&'static str>,
}

const START_STOP: FrequencyQueries = FrequencyQueries::StartStop {
    start: "FA?",
    stop: "FB?",
};

const CENTER_SPAN: FrequencyQueries = FrequencyQueries::CenterSpan {
    center: "CF?",
    span: "SP?",
};

static HP_8566: HpGrammar = HpGrammar {
    single_sweep: "SNGLS;",
    take_sweep: "TS;",
    width_select: None,
    trace_dump: "O2;TA;",
    reference_level: "RL?",
    log_scale: "LG?",
    frequency: START_STOP,
    rbw: Some("RB?"),
    vbw: Some("VB?"),
    sweep_time: Some("ST?"),
    video_average: None,
    attenuation: Some("AT?"),
    clear_status: None,
};

static HP_8560: HpGrammar = HpGrammar {
    single_sweep: "SNGLS;",
    take_sweep: "TS;",
    width_select: None,
    trace_dump: "TDF B;MDS W;TRA?;",
    reference_level: "RL?",
    log_scale: "LG?",
    frequency: START_STOP,
    rbw: Some("RB?"),
    vbw: Some("VB?"),
    sweep_time: Some("ST?"),
    video_average: Some("VAVG?"),
    attenuation: Some("AT?"),
    clear_status: None,
};

static HP_8569B: HpGrammar = HpGrammar {
    single_sweep: "SNGLS;",
    take_sweep: "TS;",
    width_select: Some("MDS B;"),
    trace_dump: "TDF B;TRA?;",
    reference_level: "RL?",
    log_scale: "LG?",
    frequency: START_STOP,
    rbw: Some("RB?"),
    vbw: None,
    sweep_time: None,
    video_average: None,
    attenuation: Some("AT?"),
    clear_status: None,
};

static HP_3585: HpGrammar = HpGrammar {
    single_sweep: "S2",
    take_sweep: "S2",
    width_select: None,
    trace_dump: "SA",
    reference_level: "RL?",
    log_scale: "LG?",
    frequency: CENTER_SPAN,
    rbw: Some("RB?"),
    vbw: Some("VB?"),
    sweep_time: Some("ST?"),
    video_average: None,
    attenuation: None,
    clear_status: Some("CS"),
};

static HP_358X: HpGrammar = HpGrammar {
    single_sweep: "SNGLS;",
    take_sweep: "TS;",
    width_select: None,
    trace_dump: "TDF B;MDS W;TRA?;",
    reference_level: "RL?",
    log_scale: "LG?",
    frequency: CENTER_SPAN,
    rbw: Some("RB?"),
    vbw: Some("VB?"),
    sweep_time: Some("ST?"),
    video_average: Some("VAVG?"),
    attenuation: None,
    clear_status: Some("CLS;"),
};

/// Command set for an HP dialect
pub fn grammar(dialect: Dialect) -> Option<&'static HpGrammar> {
    match dialect {
        Dialect::Hp8566 => Some(&HP_8566),
        Dialect::Hp8560 | Dialect::Hp8590 | Dialect::Hp70000 => Some(&HP_8560),
        Dialect::Hp8569b => Some(&HP_8569B),
        Dialect::Hp3585 => Some(&HP_3585),
        Dialect::Hp358x => Some(&HP_358X),
        _ => None,
    }
}
