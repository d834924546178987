//! Advantest R3xxx grammar
//!
//! Advantest analyzers speak an HP-like mnemonic language. Two quirks matter
//! for acquisition:
//!
//! - `DD?` (dB/division) answers [`DB_PER_DIV_NOT_VALID`] while the display
//!   is in linear mode or still switching; it must be polled until a real
//!   value appears.
//! - The trace dump is only valid once the "sweep end" bit is set in the
//!   serial-poll status byte.

use crate::dialect::Dialect;

/// Sentinel dB/division value meaning "not logarithmic (yet)"
pub const DB_PER_DIV_NOT_VALID: f64 = 10000.0;

/// Select single-sweep mode
pub const SINGLE_SWEEP: &str = "SI";
/// Clear the status byte
pub const CLEAR_STATUS: &str = "CS";
/// Enable SRQ on sweep end
pub const ENABLE_SWEEP_SRQ: &str = "S0";
/// Start one sweep
pub const TAKE_SWEEP: &str = "TS";
/// Binary trace A dump
pub const TRACE_DUMP: &str = "TBA?";

/// Reference level query
pub const REFERENCE_LEVEL: &str = "RL?";
/// dB per division query
pub const DB_PER_DIV: &str = "DD?";
/// Start frequency query
pub const START: &str = "FA?";
/// Stop frequency query
pub const STOP: &str = "FB?";
/// Resolution bandwidth query
pub const RBW: &str = "RB?";
/// Video bandwidth query
pub const VBW: &str = "VB?";
/// Sweep time query
pub const SWEEP_TIME: &str = "SWT?";
/// Input attenuation query
pub const ATTENUATION: &str = "AT?";
/// Trace point count query (models with selectable point counts)
pub const POINTS: &str = "TPN?";

/// Whether the dialect lets the operator change the trace point count
pub fn has_selectable_points(dialect: Dialect) -> bool {
    dialect.caps().point_counts.len() > 1
}

/// Whether a `DD?` reply is the "not yet valid" sentinel
pub fn is_not_valid(db_per_div: f64) -> bool {
    db_per_div >= DB_PER_DIV_NOT_VALID || db_per_div <= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel() {
        assert!(is_not_valid(10000.0));
        assert!(is_not_valid(0.0));
        assert!(!is_not_valid(10.0));
        assert!(!is_not_valid(0.5));
    }

    #[test]
    fn test_selectable_points() {
        assert!(has_selectable_points(Dialect::AdvantestR3267));
        assert!(!has_selectable_points(Dialect::AdvantestR3261));
    }
}
