//! SCPI analyzers
//!
//! Configuration selects the binary block format and turns off continuous
//! sweep. A fetch starts one sweep, waits for `*OPC?` and reads an
//! IEEE-488.2 block of dBm values.

use sa_protocol::scpi::{self, ScaleQuery, ScpiGrammar};
use sa_protocol::{ieee488, Dialect, ProtocolError};

use super::{check_points, foreign_dialect, point_count, with_offset, DialectDriver, Link};
use crate::error::AcquireError;
use crate::state::InstrumentState;

/// Driver for the SCPI dialects
#[derive(Debug, Clone)]
pub struct ScpiDriver {
    dialect: Dialect,
    grammar: Option<&'static ScpiGrammar>,
}

impl ScpiDriver {
    /// Create a driver for `dialect`
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            grammar: scpi::grammar(dialect),
        }
    }

    fn grammar(&self) -> Result<&'static ScpiGrammar, AcquireError> {
        self.grammar.ok_or_else(|| foreign_dialect(self.dialect))
    }

    fn read_point_count(&self, link: &mut Link<'_>, g: &ScpiGrammar) -> Result<usize, AcquireError> {
        if let Some(points) = self.dialect.fixed_point_count() {
            return Ok(points);
        }
        let query = g.points.ok_or_else(|| {
            ProtocolError::UnsupportedFeature(format!(
                "{} has no point count query",
                self.dialect.name()
            ))
        })?;
        point_count(link.number(query)?)
    }
}

impl DialectDriver for ScpiDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn configure(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<(), AcquireError> {
        let g = self.grammar()?;
        let format = scpi::block_format(self.dialect).ok_or_else(|| foreign_dialect(self.dialect))?;

        link.command(scpi::CONTINUOUS_OFF)?;
        for command in scpi::format_commands(format) {
            link.command(command)?;
        }
        state.cache.scpi_format = Some(format);

        if let Some(spacing) = g.spacing {
            let reply = link.query(spacing)?;
            if scpi::is_linear_spacing(&reply) {
                return Err(AcquireError::LinearDisplay(self.dialect.name()));
            }
        }

        state.max_dbm = link.number(g.reference_level)?;
        let (ScaleQuery::PerDivision(query) | ScaleQuery::FullRange(query)) = g.scale;
        let division_count = state.division_count;
        state.db_per_division = link.settled(query, |reply| {
            scpi::db_per_division(g.scale, reply, division_count).ok()
        })?;

        link.frequency_axis(g.frequency, state)?;
        state.trace_point_count = self.read_point_count(link, g)?;

        state.rbw_hz = link.optional(Some(g.rbw))?;
        state.vbw_hz = link.optional(g.vbw)?;
        state.sweep_seconds = link.optional(g.sweep_time)?;
        state.video_avg_count = link.optional_count(g.average)?;
        state.rf_atten_db = link.optional(g.attenuation)?;
        Ok(())
    }

    fn fetch(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<Vec<f64>, AcquireError> {
        let g = self.grammar()?;
        let format = state
            .cache
            .scpi_format
            .or_else(|| scpi::block_format(self.dialect))
            .ok_or_else(|| foreign_dialect(self.dialect))?;
        let points = state.trace_point_count;

        link.command(scpi::TAKE_SWEEP)?;
        link.wait_for_completion(scpi::OPERATION_COMPLETE)?;

        let raw = link.query_binary(g.trace_query, ieee488::encoded_len(points * 4))?;
        let values = ieee488::decode_samples(ieee488::block_data(&raw)?, format)?;
        Ok(with_offset(check_points(points, values)?, state.ampl_offset_db))
    }
}
