//! Instrument state tracking
//!
//! [`InstrumentState`] is the record every stage of a connection reads and
//! writes: identification fills in the dialect, configuration reads back the
//! display geometry, and each fetch consults it to scale the trace.

use sa_protocol::{tek::WfmPreamble, Dialect, ReceiverTarget, ScpiFormat};
use serde::{Deserialize, Serialize};

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection
    #[default]
    Disconnected,
    /// Waiting for an identity reply
    Identifying,
    /// Reading back the display setup
    Configuring,
    /// Traces can be fetched
    Ready,
    /// The last connect failed; see the error text
    Failed,
}

/// Per-connection data a dialect needs between fetches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialectCache {
    /// Waveform preamble, read on the first fetch
    pub preamble: Option<WfmPreamble>,
    /// Block format selected at configure time
    pub scpi_format: Option<ScpiFormat>,
}

impl DialectCache {
    /// Drop everything cached
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Everything known about the connected instrument
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentState {
    /// Connection lifecycle
    pub connection: ConnectionState,
    /// Selected dialect
    pub dialect: Option<Dialect>,
    /// Identity reply
    pub id: String,

    /// Frequency of the first bucket's lower edge
    pub min_hz: f64,
    /// Frequency of the last bucket's upper edge
    pub max_hz: f64,
    /// Midpoint of the sweep
    pub center_hz: f64,

    /// Top of the graticule
    pub max_dbm: f64,
    /// Bottom of the graticule
    pub min_dbm: f64,
    /// Log scale
    pub db_per_division: f64,
    /// Vertical graticule divisions
    pub division_count: u32,

    /// Points per trace
    pub trace_point_count: usize,

    /// Resolution bandwidth, if the instrument reports it
    pub rbw_hz: Option<f64>,
    /// Video bandwidth, if the instrument reports it
    pub vbw_hz: Option<f64>,
    /// Video averaging count, if the instrument reports it
    pub video_avg_count: Option<u32>,
    /// Sweep time, if the instrument reports it
    pub sweep_seconds: Option<f64>,
    /// Input attenuation, if the instrument reports it
    pub rf_atten_db: Option<f64>,

    /// Static frequency calibration offset
    pub freq_offset_hz: f64,
    /// Static amplitude calibration offset
    pub ampl_offset_db: f64,

    /// Text of the last recorded error
    pub error: Option<String>,

    /// Control target for the self-configuring receiver
    pub receiver_target: ReceiverTarget,

    /// Dialect cache
    #[serde(skip)]
    pub cache: DialectCache,
}

impl InstrumentState {
    /// Whether the last operation recorded an error
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Record an error message
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Clear the error flag
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Forget everything learned from the instrument, keeping the offsets
    /// and receiver target the caller configured
    pub fn reset(&mut self) {
        *self = Self {
            freq_offset_hz: self.freq_offset_hz,
            ampl_offset_db: self.ampl_offset_db,
            receiver_target: self.receiver_target.clone(),
            ..Self::default()
        };
    }

    /// Set the frequency axis from start/stop
    pub fn set_start_stop(&mut self, start_hz: f64, stop_hz: f64) {
        self.min_hz = start_hz;
        self.max_hz = stop_hz;
        self.center_hz = (start_hz + stop_hz) / 2.0;
    }

    /// Set the frequency axis from center/span
    pub fn set_center_span(&mut self, center_hz: f64, span_hz: f64) {
        self.set_start_stop(center_hz - span_hz / 2.0, center_hz + span_hz / 2.0);
    }

    /// Bottom of the graticule implied by the top, scale and divisions
    pub fn graticule_bottom(&self) -> f64 {
        self.max_dbm - self.db_per_division * f64::from(self.division_count)
    }

    /// Derive the remaining geometry and apply the static offsets
    ///
    /// Called once after the dialect has read back its display setup.
    pub fn finish_configure(&mut self) {
        self.min_hz += self.freq_offset_hz;
        self.max_hz += self.freq_offset_hz;
        self.center_hz = (self.min_hz + self.max_hz) / 2.0;

        self.max_dbm += self.ampl_offset_db;
        self.min_dbm = self.graticule_bottom();
    }

    /// Total span
    pub fn span_hz(&self) -> f64 {
        self.max_hz - self.min_hz
    }
}
