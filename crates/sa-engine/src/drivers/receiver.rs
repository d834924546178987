//! Self-configuring direct-digital receiver
//!
//! The receiver has no display to read back. Its geometry follows from the
//! control target applied at configure time, and its sweeps arrive in dBm.

use sa_protocol::{Dialect, ReceiverBackend};
use tracing::info;

use super::{check_points, with_offset, DialectDriver, Link};
use crate::error::AcquireError;
use crate::state::InstrumentState;

/// Log scale used to draw receiver traces
const DISPLAY_DB_PER_DIVISION: f64 = 10.0;

/// Driver for the USB direct-digital receiver
#[derive(Debug, Clone, Default)]
pub struct ReceiverDriver {
    serial: Option<String>,
}

impl ReceiverDriver {
    /// Create a driver that opens the receiver with `serial`, or the first one found
    pub fn new(serial: Option<String>) -> Self {
        Self { serial }
    }
}

fn backend<'b>(link: &'b mut Link<'_>) -> Result<&'b mut Box<dyn ReceiverBackend>, AcquireError> {
    link.receiver.as_deref_mut().ok_or(AcquireError::NoReceiver)
}

impl DialectDriver for ReceiverDriver {
    fn dialect(&self) -> Dialect {
        Dialect::DirectReceiver
    }

    fn uses_transport(&self) -> bool {
        false
    }

    fn configure(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<(), AcquireError> {
        let receiver = backend(link)?;
        state.id = receiver.open(self.serial.as_deref())?;

        let target = state.receiver_target.clone();
        let geometry = receiver.configure(&target)?;
        info!(
            "{} configured: {} points, {} Hz to {} Hz",
            state.id, geometry.points, geometry.start_hz, geometry.stop_hz
        );

        state.set_start_stop(geometry.start_hz, geometry.stop_hz);
        state.max_dbm = target.reference_level_dbm;
        state.db_per_division = DISPLAY_DB_PER_DIVISION;
        state.trace_point_count = geometry.points;
        state.rbw_hz = Some(geometry.rbw_hz);
        state.sweep_seconds = Some(geometry.sweep_seconds);
        state.rf_atten_db = Some(target.attenuation_db);
        Ok(())
    }

    fn fetch(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<Vec<f64>, AcquireError> {
        let values = backend(link)?.sweep()?;
        Ok(with_offset(
            check_points(state.trace_point_count, values)?,
            state.ampl_offset_db,
        ))
    }

    fn release(&mut self, link: &mut Link<'_>) {
        if let Ok(receiver) = backend(link) {
            receiver.close();
        }
    }
}
