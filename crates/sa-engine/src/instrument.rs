//! Instrument handle
//!
//! [`InstrumentHandle`] owns one transport, the [`InstrumentState`] of the
//! instrument behind it and the driver selected at connect time:
//!
//! ```text
//! Disconnected -> Identifying -> Configuring -> Ready
//!                      |              |
//!                      +------+-------+
//!                             v
//!                           Failed
//! ```
//!
//! Failures never panic and never decide process fatality. They leave the
//! state self-consistent with the error flag set, and a fetch that fails
//! returns an empty trace.

use sa_detect::identify;
use sa_protocol::{
    CancelToken, Dialect, Family, ProtocolError, ReceiverBackend, ReceiverTarget, Transport,
};
use tracing::{debug, info, warn};

use crate::drivers::{driver_for, DialectDriver, Link, MAX_TRACE_POINTS};
use crate::error::AcquireError;
use crate::options::AcquireOptions;
use crate::state::{ConnectionState, InstrumentState};
use crate::trace::TraceBuffer;

/// One analyzer connection
pub struct InstrumentHandle<T: Transport> {
    transport: T,
    transport_open: bool,
    receiver: Option<Box<dyn ReceiverBackend>>,
    driver: Option<Box<dyn DialectDriver>>,
    state: InstrumentState,
    options: AcquireOptions,
    configured_points: usize,
    reconnect_required: bool,
    cancel: CancelToken,
}

impl<T: Transport> InstrumentHandle<T> {
    /// Create a disconnected handle around `transport`
    pub fn startup(transport: T) -> Self {
        Self {
            transport,
            transport_open: false,
            receiver: None,
            driver: None,
            state: InstrumentState::default(),
            options: AcquireOptions::default(),
            configured_points: 0,
            reconnect_required: false,
            cancel: CancelToken::new(),
        }
    }

    /// Attach a direct-digital receiver backend
    pub fn with_receiver(mut self, receiver: Box<dyn ReceiverBackend>) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Replace the direct-digital receiver backend
    pub fn set_receiver_backend(&mut self, receiver: Box<dyn ReceiverBackend>) {
        self.receiver = Some(receiver);
    }

    /// Token that aborts the current connect or fetch when cancelled
    ///
    /// The token is shared, so it can be handed to another thread or a
    /// signal handler. `connect` clears it before starting.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current instrument state
    pub fn state(&self) -> &InstrumentState {
        &self.state
    }

    /// Options of the last connect
    pub fn options(&self) -> &AcquireOptions {
        &self.options
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Whether traces can be fetched
    pub fn is_ready(&self) -> bool {
        self.state.connection == ConnectionState::Ready
    }

    /// Whether the instrument changed its setup in a way only a reconnect picks up
    pub fn reconnect_required(&self) -> bool {
        self.reconnect_required
    }

    /// Change the control target of the self-configuring receiver
    ///
    /// The target is applied on the next connect.
    pub fn set_receiver_target(&mut self, target: ReceiverTarget) {
        self.options.receiver_target = target.clone();
        self.state.receiver_target = target;
        if self.is_ready() && self.state.dialect == Some(Dialect::DirectReceiver) {
            debug!("Receiver target changed; reconnect to apply");
            self.reconnect_required = true;
        }
    }

    fn link_parts(
        &mut self,
    ) -> (
        Option<&mut (dyn DialectDriver + 'static)>,
        Link<'_>,
        &mut InstrumentState,
    ) {
        let link = Link {
            transport: &mut self.transport,
            receiver: self.receiver.as_mut(),
            cancel: &self.cancel,
            timing: &self.options.timing,
        };
        (self.driver.as_deref_mut(), link, &mut self.state)
    }

    /// Connect to the instrument described by `options`
    ///
    /// On failure the instrument is returned to local control and the error
    /// is recorded in the state, unless the caller cancelled.
    pub fn connect(&mut self, options: &AcquireOptions) -> Result<(), AcquireError> {
        if self.state.connection != ConnectionState::Disconnected {
            self.disconnect(false);
        }
        self.cancel.reset();
        self.options = options.clone();
        self.reconnect_required = false;
        self.configured_points = 0;

        self.state.reset();
        self.state.freq_offset_hz = options.freq_offset_hz;
        self.state.ampl_offset_db = options.ampl_offset_db;
        self.state.receiver_target = options.receiver_target.clone();

        match self.establish() {
            Ok(()) => {
                self.configured_points = self.state.trace_point_count;
                self.state.connection = ConnectionState::Ready;
                info!(
                    "Connected to {} ({:?}): {} points, {} Hz to {} Hz, {} dBm to {} dBm",
                    self.state.dialect.map_or("?", |d| d.name()),
                    self.state.id,
                    self.state.trace_point_count,
                    self.state.min_hz,
                    self.state.max_hz,
                    self.state.min_dbm,
                    self.state.max_dbm
                );
                Ok(())
            }
            Err(e) => {
                self.release();
                if e.is_cancelled() {
                    info!("Connect cancelled");
                    self.state.connection = ConnectionState::Disconnected;
                } else {
                    warn!("Connect failed: {}", e);
                    self.state.connection = ConnectionState::Failed;
                    self.state.set_error(e.to_string());
                }
                Err(e)
            }
        }
    }

    fn establish(&mut self) -> Result<(), AcquireError> {
        let forced = self.options.dialect.or_else(|| {
            (self.options.family == Family::DirectDigital).then_some(Dialect::DirectReceiver)
        });

        let dialect = match forced {
            Some(dialect) => {
                debug!("{} selected; skipping identification", dialect.name());
                dialect
            }
            None => {
                self.open_transport()?;
                self.state.connection = ConnectionState::Identifying;
                let identity = identify(
                    &mut self.transport,
                    self.options.family,
                    &self.options.timing.identify(),
                    &self.cancel,
                )?;
                self.state.id = identity.id;
                identity.dialect
            }
        };

        let driver = driver_for(dialect, &self.options);
        if driver.uses_transport() {
            self.open_transport()?;
        }

        let caps = dialect.caps();
        self.state.dialect = Some(dialect);
        self.state.division_count = caps.division_count;
        self.state.trace_point_count = dialect.fixed_point_count().unwrap_or(0);
        self.state.connection = ConnectionState::Configuring;
        self.driver = Some(driver);

        let (driver, mut link, state) = self.link_parts();
        let driver = driver.ok_or(AcquireError::NotReady(state.connection))?;
        driver.configure(&mut link, state)?;

        let span_ok = state.min_hz.is_finite() && state.max_hz.is_finite();
        if !span_ok || state.max_hz <= state.min_hz {
            return Err(AcquireError::ZeroSpan {
                start_hz: state.min_hz,
                stop_hz: state.max_hz,
            });
        }
        if !(1..=MAX_TRACE_POINTS).contains(&state.trace_point_count) {
            return Err(AcquireError::UnsupportedPointCount(state.trace_point_count));
        }
        state.finish_configure();
        Ok(())
    }

    fn open_transport(&mut self) -> Result<(), AcquireError> {
        if !self.transport_open {
            self.transport.open(&self.options.link_settings())?;
            self.transport_open = true;
        }
        Ok(())
    }

    /// Release the driver and return the instrument to local control
    fn release(&mut self) {
        if let (Some(driver), mut link, _) = self.link_parts() {
            driver.release(&mut link);
        }
        self.driver = None;
        if self.transport_open {
            self.transport.close(true);
            self.transport_open = false;
        }
        self.state.cache.clear();
    }

    /// Trigger one sweep and return its trace
    ///
    /// Errors are also recorded in the state; see [`fetch_trace`](Self::fetch_trace).
    pub fn try_fetch_trace(&mut self) -> Result<TraceBuffer, AcquireError> {
        if !self.is_ready() {
            return Err(AcquireError::NotReady(self.state.connection));
        }
        self.state.clear_error();
        self.state.trace_point_count = self.configured_points;

        let result = {
            let (driver, mut link, state) = self.link_parts();
            match driver {
                Some(driver) => driver.fetch(&mut link, state),
                None => Err(AcquireError::NotReady(state.connection)),
            }
        };

        match result {
            Ok(amplitudes) => Ok(TraceBuffer::new(
                amplitudes,
                self.state.min_hz,
                self.state.max_hz,
            )),
            Err(e) => {
                self.record_fetch_error(&e);
                Err(e)
            }
        }
    }

    /// Trigger one sweep and return its trace, or an empty trace on failure
    ///
    /// A failed fetch leaves `trace_point_count` at zero and sets the error
    /// flag; a cancelled one only zeroes the point count. The next fetch
    /// starts over from the configured point count.
    pub fn fetch_trace(&mut self) -> TraceBuffer {
        self.try_fetch_trace().unwrap_or_default()
    }

    fn record_fetch_error(&mut self, e: &AcquireError) {
        self.state.trace_point_count = 0;
        if e.is_cancelled() {
            debug!("Fetch cancelled");
            return;
        }

        warn!("Fetch failed: {}", e);
        self.state.set_error(e.to_string());
        if matches!(
            e,
            AcquireError::Protocol(ProtocolError::PointCountMismatch { .. })
        ) {
            self.reconnect_required = true;
        }
        if matches!(e, AcquireError::Transport(_)) {
            self.release();
            self.state.connection = ConnectionState::Failed;
        }
    }

    /// Disconnect, returning the instrument to local control
    ///
    /// With `final_exit` the recorded error is cleared as well, leaving the
    /// handle as fresh as after [`startup`](Self::startup).
    pub fn disconnect(&mut self, final_exit: bool) {
        if self.state.connection != ConnectionState::Disconnected || self.transport_open {
            debug!("Disconnecting");
        }
        self.release();
        self.state.connection = ConnectionState::Disconnected;
        self.configured_points = 0;
        if final_exit {
            self.state.clear_error();
        }
    }

    /// Disconnect and give back the transport
    pub fn shutdown(mut self) -> T {
        self.disconnect(true);
        info!("Shut down");
        let Self { transport, .. } = self;
        transport
    }
}
