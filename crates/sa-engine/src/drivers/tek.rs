//! Tektronix 49x/271x/278x
//!
//! The curve is raw display bytes framed by an echoed header, a two-byte
//! count and a checksum. Scaling needs the waveform preamble, which is read
//! once per connection and cached until the point count changes.

use sa_protocol::tek::{self, WfmPreamble};
use sa_protocol::{Dialect, ProtocolError};
use tracing::debug;

use super::{check_points, DialectDriver, Link};
use crate::error::AcquireError;
use crate::state::InstrumentState;

/// Driver for the Tektronix dialects
#[derive(Debug, Clone)]
pub struct TekDriver {
    dialect: Dialect,
}

impl TekDriver {
    /// Create a driver for `dialect`
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    fn preamble(
        &self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<WfmPreamble, AcquireError> {
        if let Some(preamble) = &state.cache.preamble {
            return Ok(preamble.clone());
        }
        let reply = link.query(tek::PREAMBLE_QUERY)?;
        let preamble = WfmPreamble::parse(&reply)?;
        debug!(
            "{} preamble: {} points, {} dB/code",
            self.dialect.name(),
            preamble.point_count,
            preamble.gain
        );
        state.cache.preamble = Some(preamble.clone());
        Ok(preamble)
    }
}

impl DialectDriver for TekDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn configure(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<(), AcquireError> {
        link.command(tek::SELECT_BINARY)?;

        let scale = link.settled(tek::VERTICAL_DISPLAY, |reply| {
            tek::parse_vertical_display(reply).ok()
        })?;
        state.db_per_division = scale
            .db_per_division()
            .ok_or(AcquireError::LinearDisplay(self.dialect.name()))?;

        state.max_dbm = link.number(tek::REFERENCE_LEVEL)?;

        // SPAN? reports the span per horizontal division
        let center = link.number(tek::CENTER)?;
        let span = link.number(tek::SPAN)? * tek::HORIZONTAL_DIVISIONS;
        state.set_center_span(center, span);

        state.rbw_hz = link.optional(Some(tek::RBW))?;
        state.vbw_hz = link.optional(Some(tek::VBW))?;
        state.rf_atten_db = link.optional(Some(tek::ATTENUATION))?;
        Ok(())
    }

    fn fetch(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<Vec<f64>, AcquireError> {
        let points = state.trace_point_count;
        let preamble = self.preamble(link, state)?;
        if preamble.point_count != points {
            state.cache.preamble = None;
            return Err(ProtocolError::PointCountMismatch {
                expected: points,
                actual: preamble.point_count,
            }
            .into());
        }

        link.command(tek::SINGLE_SWEEP)?;
        link.command(tek::WAIT)?;
        let raw = link.query_binary(tek::CURVE_QUERY, tek::MAX_CURVE_LEN)?;
        let data = tek::parse_curve(&raw)?;

        check_points(points, preamble.scale(data, state.ampl_offset_db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Timing;
    use sa_protocol::{CancelToken, LinkSettings, Transport};
    use sa_sim::VirtualAnalyzer;

    #[test]
    fn test_preamble_is_read_once() {
        let mut analyzer = VirtualAnalyzer::new(Dialect::Tek2710);
        analyzer.open(&LinkSettings::default()).unwrap();
        let cancel = CancelToken::new();
        let timing = Timing::default();
        let mut state = InstrumentState {
            division_count: 8,
            trace_point_count: 512,
            ..Default::default()
        };

        let mut driver = TekDriver::new(Dialect::Tek2710);
        let mut link = Link {
            transport: &mut analyzer,
            receiver: None,
            cancel: &cancel,
            timing: &timing,
        };
        driver.configure(&mut link, &mut state).unwrap();
        assert_eq!(state.db_per_division, 10.0);
        assert_eq!(state.span_hz(), 1e6);

        assert_eq!(driver.fetch(&mut link, &mut state).unwrap().len(), 512);
        assert_eq!(driver.fetch(&mut link, &mut state).unwrap().len(), 512);

        let preamble_reads = analyzer
            .sent()
            .iter()
            .filter(|c| *c == tek::PREAMBLE_QUERY)
            .count();
        assert_eq!(preamble_reads, 1);
    }
}
