//! HP/Agilent legacy mnemonic analyzers
//!
//! Traces are fixed blocks of display codes scaled against the graticule.
//! The 3585 and 358x only release a valid block after their "sweep complete"
//! status bit is seen by serial poll.

use sa_protocol::hp::{self, HpGrammar};
use sa_protocol::{BlockFormat, Dialect, Shape};

use super::{foreign_dialect, DialectDriver, Link};
use crate::error::AcquireError;
use crate::state::InstrumentState;

/// Driver for the HP dialects
#[derive(Debug, Clone)]
pub struct HpDriver {
    dialect: Dialect,
    grammar: Option<&'static HpGrammar>,
}

impl HpDriver {
    /// Create a driver for `dialect`
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            grammar: hp::grammar(dialect),
        }
    }

    fn grammar(&self) -> Result<&'static HpGrammar, AcquireError> {
        self.grammar.ok_or_else(|| foreign_dialect(self.dialect))
    }

    fn dump(
        &self,
        link: &mut Link<'_>,
        state: &InstrumentState,
        block: BlockFormat,
    ) -> Result<Vec<f64>, AcquireError> {
        let g = self.grammar()?;
        let points = state.trace_point_count;
        let raw = link.query_binary(g.trace_dump, block.byte_len(points))?;
        Ok(block.decode(&raw, points, state.min_dbm, state.max_dbm)?)
    }
}

impl DialectDriver for HpDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn configure(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<(), AcquireError> {
        let g = self.grammar()?;
        link.command(g.single_sweep)?;

        // LG? answers 0 in linear mode
        let log = link.number(g.log_scale)?;
        if log <= 0.0 {
            return Err(AcquireError::LinearDisplay(self.dialect.name()));
        }
        state.db_per_division = log;
        state.max_dbm = link.number(g.reference_level)?;
        link.frequency_axis(g.frequency, state)?;

        state.rbw_hz = link.optional(g.rbw)?;
        state.vbw_hz = link.optional(g.vbw)?;
        state.sweep_seconds = link.optional(g.sweep_time)?;
        state.video_avg_count = link.optional_count(g.video_average)?;
        state.rf_atten_db = link.optional(g.attenuation)?;
        Ok(())
    }

    fn fetch(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<Vec<f64>, AcquireError> {
        let g = self.grammar()?;
        match self.dialect.caps().shape {
            Shape::FixedBlock(block) => {
                if let Some(width) = g.width_select {
                    link.command(width)?;
                }
                link.command(g.take_sweep)?;
                self.dump(link, state, block)
            }
            Shape::SerialPollGated { block, done_mask } => {
                if let Some(clear) = g.clear_status {
                    link.command(clear)?;
                }
                link.command(g.take_sweep)?;
                link.wait_for_status(done_mask)?;
                self.dump(link, state, block)
            }
            _ => Err(foreign_dialect(self.dialect)),
        }
    }
}
