//! Per-family acquisition drivers
//!
//! Identification is shared and table driven; everything after it is
//! family specific. Each family implements [`DialectDriver`], parameterised
//! by the dialect it was selected for:
//!
//! - `configure` forces single-sweep triggering, rejects linear displays and
//!   reads back the display geometry into [`InstrumentState`]
//! - `fetch` triggers exactly one sweep and returns its calibrated samples

mod advantest;
mod anritsu;
mod hp;
mod receiver;
mod scpi;
mod tek;

use sa_protocol::reply::{parse_integer, parse_number};
use sa_protocol::transport::DEFAULT_REPLY_LEN;
use sa_protocol::{CancelToken, Dialect, Family, FrequencyQueries, ReceiverBackend, Transport};
use tracing::{debug, trace};

use crate::error::AcquireError;
use crate::options::{AcquireOptions, Timing};
use crate::retry::{poll_until, Expiry};
use crate::state::InstrumentState;

pub use advantest::AdvantestDriver;
pub use anritsu::AnritsuDriver;
pub use hp::HpDriver;
pub use receiver::ReceiverDriver;
pub use scpi::ScpiDriver;
pub use tek::TekDriver;

/// Everything a driver may touch during one operation
pub struct Link<'a> {
    /// Bus transport
    pub transport: &'a mut dyn Transport,
    /// Attached direct-digital receiver, if any
    pub receiver: Option<&'a mut Box<dyn ReceiverBackend>>,
    /// Cancellation signal
    pub cancel: &'a CancelToken,
    /// Loop timeouts
    pub timing: &'a Timing,
}

impl Link<'_> {
    /// Send a command that has no reply
    pub fn command(&mut self, command: &str) -> Result<(), AcquireError> {
        debug!("-> {}", command);
        Ok(self.transport.write(command)?)
    }

    /// Send a query and return its ASCII reply
    pub fn query(&mut self, query: &str) -> Result<String, AcquireError> {
        self.transport.write(query)?;
        let reply = self.transport.read_ascii(DEFAULT_REPLY_LEN)?;
        trace!("{} <- {:?}", query, reply.trim_end());
        Ok(reply)
    }

    /// Send a query and read a binary reply of at most `max_len` bytes
    pub fn query_binary(&mut self, query: &str, max_len: usize) -> Result<Vec<u8>, AcquireError> {
        debug!("-> {}", query);
        self.transport.write(query)?;
        let data = self.transport.read_binary(max_len)?;
        trace!("{} <- {} bytes", query, data.len());
        Ok(data)
    }

    /// Query until the reply holds a number
    ///
    /// Replies that do not parse are treated as "not settled yet" and the
    /// query is repeated until the settle timeout.
    pub fn number(&mut self, query: &str) -> Result<f64, AcquireError> {
        self.settled(query, |reply| parse_number(reply).ok())
    }

    /// Query until `accept` maps the reply to a value
    pub fn settled<T>(
        &mut self,
        query: &str,
        mut accept: impl FnMut(&str) -> Option<T>,
    ) -> Result<T, AcquireError> {
        let policy = self.timing.settle();
        let cancel = self.cancel;
        poll_until(policy, cancel, Expiry::Settle(query), || {
            let reply = self.query(query)?;
            Ok(accept(&reply))
        })
    }

    /// Query a value the instrument may not report
    ///
    /// Negative replies are the instruments' "not available" encoding.
    pub fn optional(&mut self, query: Option<&str>) -> Result<Option<f64>, AcquireError> {
        let Some(query) = query else {
            return Ok(None);
        };
        let reply = self.query(query)?;
        Ok(parse_number(&reply).ok().filter(|v| *v >= 0.0))
    }

    /// Optional integer readback (averaging counts)
    pub fn optional_count(&mut self, query: Option<&str>) -> Result<Option<u32>, AcquireError> {
        let Some(query) = query else {
            return Ok(None);
        };
        let reply = self.query(query)?;
        Ok(parse_integer(&reply)
            .ok()
            .and_then(|v| u32::try_from(v).ok()))
    }

    /// Read the frequency axis into `state`
    pub fn frequency_axis(
        &mut self,
        queries: FrequencyQueries,
        state: &mut InstrumentState,
    ) -> Result<(), AcquireError> {
        match queries {
            FrequencyQueries::StartStop { start, stop } => {
                let start = self.number(start)?;
                let stop = self.number(stop)?;
                state.set_start_stop(start, stop);
            }
            FrequencyQueries::CenterSpan { center, span } => {
                let center = self.number(center)?;
                let span = self.number(span)?;
                state.set_center_span(center, span);
            }
        }
        Ok(())
    }

    /// Repeat an operation-complete query until it answers `1`
    pub fn wait_for_completion(&mut self, query: &str) -> Result<(), AcquireError> {
        let policy = self.timing.sweep();
        let cancel = self.cancel;
        poll_until(policy, cancel, Expiry::Sweep, || {
            let reply = self.query(query)?;
            Ok((parse_integer(&reply).ok() == Some(1)).then_some(()))
        })
    }

    /// Poll the status byte until any bit of `mask` is set
    pub fn wait_for_status(&mut self, mask: u8) -> Result<u8, AcquireError> {
        let policy = self.timing.sweep();
        let cancel = self.cancel;
        poll_until(policy, cancel, Expiry::Sweep, || {
            let status = self.transport.serial_poll()?;
            trace!("status 0x{:02X}", status);
            Ok((status & mask != 0).then_some(status))
        })
    }
}

/// Family-specific configure and fetch
pub trait DialectDriver {
    /// Dialect this driver was built for
    fn dialect(&self) -> Dialect;

    /// Whether the driver talks over the bus transport
    fn uses_transport(&self) -> bool {
        true
    }

    /// Prepare the instrument and read its display setup into `state`
    fn configure(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<(), AcquireError>;

    /// Trigger one sweep and return its calibrated amplitudes
    fn fetch(
        &mut self,
        link: &mut Link<'_>,
        state: &mut InstrumentState,
    ) -> Result<Vec<f64>, AcquireError>;

    /// Release driver resources on disconnect
    fn release(&mut self, _link: &mut Link<'_>) {}
}

/// Build the driver for a dialect
pub fn driver_for(dialect: Dialect, options: &AcquireOptions) -> Box<dyn DialectDriver> {
    match dialect.family() {
        Family::Tektronix => Box::new(TekDriver::new(dialect)),
        Family::HewlettPackard => Box::new(HpDriver::new(dialect)),
        Family::Advantest => Box::new(AdvantestDriver::new(dialect)),
        Family::Anritsu => Box::new(AnritsuDriver::new(dialect)),
        Family::Scpi => Box::new(ScpiDriver::new(dialect)),
        Family::DirectDigital => Box::new(ReceiverDriver::new(options.receiver_serial.clone())),
    }
}

/// Largest trace any supported instrument reports
pub const MAX_TRACE_POINTS: usize = 1_000_000;

/// Convert a point-count readback, rejecting counts no instrument reports
pub(crate) fn point_count(reported: f64) -> Result<usize, AcquireError> {
    let points = reported.round();
    if !(1.0..=MAX_TRACE_POINTS as f64).contains(&points) {
        return Err(AcquireError::UnsupportedPointCount(points.max(0.0) as usize));
    }
    Ok(points as usize)
}

/// Check a decoded trace against the configured point count
pub(crate) fn check_points(expected: usize, values: Vec<f64>) -> Result<Vec<f64>, AcquireError> {
    if values.len() != expected {
        return Err(sa_protocol::ProtocolError::PointCountMismatch {
            expected,
            actual: values.len(),
        }
        .into());
    }
    Ok(values)
}

/// Apply the static amplitude offset to samples the instrument reports in dBm
pub(crate) fn with_offset(mut values: Vec<f64>, ampl_offset_db: f64) -> Vec<f64> {
    if ampl_offset_db != 0.0 {
        values.iter_mut().for_each(|v| *v += ampl_offset_db);
    }
    values
}

/// Error for a driver asked to handle a dialect outside its family
pub(crate) fn foreign_dialect(dialect: Dialect) -> AcquireError {
    sa_protocol::ProtocolError::UnsupportedFeature(format!(
        "{} is not handled by this driver",
        dialect.name()
    ))
    .into()
}
