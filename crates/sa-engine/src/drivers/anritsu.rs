//! Anritsu MS8604A/MS265x/MS266x
//!
//! The MS8604A dumps display codes like the HP analyzers; the MS2650 and
//! MS2660 answer the same dump query with an IEEE-488.2 block of milli-dBm
//! integers and accept either 501 or 1002 points.

use sa_protocol::{anritsu, ieee488, scpi, Dialect, Shape};
use tracing::debug;

use super::{check_points, foreign_dialect, point_count, with_offset, DialectDriver, Link};
use crate::error::AcquireError;
use crate::state::InstrumentState;

/// Driver for the Anritsu dialects
#[derive(Debug, Clone)]
pub struct AnritsuDriver {
    dialect: Dialect,
}

impl AnritsuDriver {
    /// Create a driver for `dialect`
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

impl DialectDriver for AnritsuDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn configure(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<(), AcquireError> {
        let caps = self.dialect.caps();
        link.command(anritsu::SINGLE_SWEEP)?;

        let scale = link.settled(anritsu::SCALE, |reply| anritsu::parse_scale(reply).ok())?;
        state.db_per_division = scale
            .db_per_division()
            .ok_or(AcquireError::LinearDisplay(caps.name))?;

        state.max_dbm = link.number(anritsu::REFERENCE_LEVEL)?;
        let start = link.number(anritsu::START)?;
        let stop = link.number(anritsu::STOP)?;
        state.set_start_stop(start, stop);

        state.rbw_hz = link.optional(Some(anritsu::RBW))?;
        state.vbw_hz = link.optional(Some(anritsu::VBW))?;
        state.sweep_seconds = link.optional(Some(anritsu::SWEEP_TIME))?;
        state.rf_atten_db = link.optional(Some(anritsu::ATTENUATION))?;
        state.video_avg_count = link.optional_count(Some(anritsu::AVERAGE))?;

        if caps.point_counts.len() > 1 {
            let points = point_count(link.number(anritsu::POINTS)?)?;
            if !caps.point_counts.contains(&points) {
                return Err(AcquireError::UnsupportedPointCount(points));
            }
            debug!("{} reports {} points", caps.name, points);
            state.trace_point_count = points;
        }

        if let Shape::ScpiBlock(format) = caps.shape {
            state.cache.scpi_format = Some(format);
        }
        link.command(anritsu::BINARY_MODE)
    }

    fn fetch(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<Vec<f64>, AcquireError> {
        let points = state.trace_point_count;
        let dump = anritsu::trace_dump(points);
        link.command(anritsu::TAKE_SWEEP)?;

        match self.dialect.caps().shape {
            Shape::FixedBlock(block) => {
                let raw = link.query_binary(&dump, block.byte_len(points))?;
                Ok(block.decode(&raw, points, state.min_dbm, state.max_dbm)?)
            }
            Shape::ScpiBlock(format) => {
                link.wait_for_completion(scpi::OPERATION_COMPLETE)?;
                let format = state.cache.scpi_format.unwrap_or(format);
                let raw = link.query_binary(&dump, ieee488::encoded_len(points * 4))?;
                let values = ieee488::decode_samples(ieee488::block_data(&raw)?, format)?;
                Ok(with_offset(check_points(points, values)?, state.ampl_offset_db))
            }
            _ => Err(foreign_dialect(self.dialect)),
        }
    }
}
