//! Advantest R3xxx analyzers
//!
//! `DD?` answers a sentinel while the display is linear or still switching,
//! so the scale is polled until it settles. A scale that never settles is
//! reported as a linear display.

use sa_protocol::advantest;
use sa_protocol::reply::parse_number;
use sa_protocol::{Dialect, FrequencyQueries, Shape};
use tracing::debug;

use super::{foreign_dialect, point_count, DialectDriver, Link};
use crate::error::AcquireError;
use crate::state::InstrumentState;

/// Driver for the Advantest dialects
#[derive(Debug, Clone)]
pub struct AdvantestDriver {
    dialect: Dialect,
}

impl AdvantestDriver {
    /// Create a driver for `dialect`
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    fn read_point_count(&self, link: &mut Link<'_>) -> Result<usize, AcquireError> {
        let points = point_count(link.number(advantest::POINTS)?)?;
        if !self.dialect.caps().point_counts.contains(&points) {
            return Err(AcquireError::UnsupportedPointCount(points));
        }
        Ok(points)
    }
}

impl DialectDriver for AdvantestDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn configure(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<(), AcquireError> {
        link.command(advantest::SINGLE_SWEEP)?;
        link.command(advantest::CLEAR_STATUS)?;
        link.command(advantest::ENABLE_SWEEP_SRQ)?;

        let name = self.dialect.name();
        state.db_per_division = link
            .settled(advantest::DB_PER_DIV, |reply| {
                parse_number(reply)
                    .ok()
                    .filter(|db| !advantest::is_not_valid(*db))
            })
            .map_err(|e| match e {
                AcquireError::SettleTimeout { .. } => AcquireError::LinearDisplay(name),
                other => other,
            })?;

        state.max_dbm = link.number(advantest::REFERENCE_LEVEL)?;
        link.frequency_axis(
            FrequencyQueries::StartStop {
                start: advantest::START,
                stop: advantest::STOP,
            },
            state,
        )?;

        state.rbw_hz = link.optional(Some(advantest::RBW))?;
        state.vbw_hz = link.optional(Some(advantest::VBW))?;
        state.sweep_seconds = link.optional(Some(advantest::SWEEP_TIME))?;
        state.rf_atten_db = link.optional(Some(advantest::ATTENUATION))?;

        if advantest::has_selectable_points(self.dialect) {
            state.trace_point_count = self.read_point_count(link)?;
            debug!("{} reports {} points", name, state.trace_point_count);
        }
        Ok(())
    }

    fn fetch(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<Vec<f64>, AcquireError> {
        let Shape::SerialPollGated { block, done_mask } = self.dialect.caps().shape else {
            return Err(foreign_dialect(self.dialect));
        };
        let points = state.trace_point_count;

        link.command(advantest::CLEAR_STATUS)?;
        link.command(advantest::TAKE_SWEEP)?;
        link.wait_for_status(done_mask)?;

        let raw = link.query_binary(advantest::TRACE_DUMP, block.byte_len(points))?;
        Ok(block.decode(&raw, points, state.min_dbm, state.max_dbm)?)
    }
}
