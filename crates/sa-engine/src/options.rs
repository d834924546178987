//! Acquisition options
//!
//! Options arrive as a whitespace-separated string of `-flag` and
//! `-key:value` tokens, e.g.
//!
//! ```text
//! -family:hp -address:18 -ampl_offset:-1.5 -points:500 -op:max
//! ```
//!
//! A bare dialect flag (`-hp8566`, `-fsu`, `-ddr`) force-selects that dialect
//! and skips identification.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sa_detect::IdentifyConfig;
use sa_protocol::{Dialect, Family, LinkSettings, ReceiverTarget, Sensitivity};
use serde::{Deserialize, Serialize};

use crate::error::OptionsError;
use crate::resample::ResampleOp;
use crate::retry::PollPolicy;

/// Timeouts and pacing for the blocking loops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Per-read link timeout
    pub link_timeout_ms: u64,
    /// Identification retry window
    pub identify_timeout_ms: u64,
    /// Wait for a readback to become valid
    pub settle_timeout_ms: u64,
    /// Wait for a sweep to complete
    pub sweep_timeout_ms: u64,
    /// Delay between polls
    pub poll_interval_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            link_timeout_ms: 3_000,
            identify_timeout_ms: 5_000,
            settle_timeout_ms: 10_000,
            sweep_timeout_ms: 60_000,
            poll_interval_ms: 50,
        }
    }
}

impl Timing {
    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Policy for values that must settle
    pub fn settle(&self) -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_millis(self.settle_timeout_ms),
            interval: self.poll_interval(),
        }
    }

    /// Policy for sweep completion
    pub fn sweep(&self) -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_millis(self.sweep_timeout_ms),
            interval: self.poll_interval(),
        }
    }

    /// Identification retry configuration
    pub fn identify(&self) -> IdentifyConfig {
        IdentifyConfig {
            timeout: Duration::from_millis(self.identify_timeout_ms),
            retry_interval: self.poll_interval(),
        }
    }
}

/// Everything `connect` and the consumer need to know
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireOptions {
    /// Vendor family, which selects the identity query
    pub family: Family,
    /// Force this dialect and skip identification
    pub dialect: Option<Dialect>,
    /// Bus address
    pub address: String,
    /// Send a device clear when opening
    pub clear: bool,
    /// Static frequency calibration offset
    pub freq_offset_hz: f64,
    /// Static amplitude calibration offset
    pub ampl_offset_db: f64,
    /// Loop timeouts
    pub timing: Timing,
    /// Serial number of the receiver to open
    pub receiver_serial: Option<String>,
    /// Control target for the receiver
    pub receiver_target: ReceiverTarget,
    /// Resample the fetched trace to this many points
    pub resample_points: Option<usize>,
    /// Resampling operation
    pub resample_op: ResampleOp,
    /// Write pairs here instead of stdout
    pub output: Option<PathBuf>,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        let link = LinkSettings::default();
        Self {
            family: Family::HewlettPackard,
            dialect: None,
            address: link.address,
            clear: link.clear,
            freq_offset_hz: 0.0,
            ampl_offset_db: 0.0,
            timing: Timing::default(),
            receiver_serial: None,
            receiver_target: ReceiverTarget::default(),
            resample_points: None,
            resample_op: ResampleOp::default(),
            output: None,
        }
    }
}

fn value<T: FromStr>(option: &'static str, text: Option<&str>) -> Result<T, OptionsError> {
    let text = text.ok_or(OptionsError::MissingValue(option))?;
    text.parse().map_err(|_| OptionsError::InvalidValue {
        option,
        value: text.to_string(),
    })
}

fn lookup<T>(
    option: &'static str,
    text: Option<&str>,
    find: impl Fn(&str) -> Option<T>,
) -> Result<T, OptionsError> {
    let text = text.ok_or(OptionsError::MissingValue(option))?;
    find(text).ok_or_else(|| OptionsError::InvalidValue {
        option,
        value: text.to_string(),
    })
}

fn sensitivity(text: &str) -> Option<Sensitivity> {
    match text.to_ascii_lowercase().as_str() {
        "low" => Some(Sensitivity::Low),
        "mid" | "medium" => Some(Sensitivity::Mid),
        "high" => Some(Sensitivity::High),
        _ => None,
    }
}

impl AcquireOptions {
    /// Link settings for opening the transport
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            address: self.address.clone(),
            timeout: Duration::from_millis(self.timing.link_timeout_ms),
            clear: self.clear,
        }
    }

    /// Family that will actually be used
    pub fn effective_family(&self) -> Family {
        self.dialect.map(|d| d.family()).unwrap_or(self.family)
    }

    /// Apply one `-flag` or `-key:value` token
    pub fn apply_token(&mut self, token: &str) -> Result<(), OptionsError> {
        let body = token
            .strip_prefix('-')
            .filter(|b| !b.is_empty())
            .ok_or_else(|| OptionsError::Malformed(token.to_string()))?;
        let (key, val) = match body.split_once(':') {
            Some((key, val)) => (key, Some(val)),
            None => (body, None),
        };

        match key.to_ascii_lowercase().as_str() {
            "family" => self.family = lookup("family", val, Family::from_flag)?,
            "dialect" => {
                let dialect = lookup("dialect", val, Dialect::from_flag)?;
                self.family = dialect.family();
                self.dialect = Some(dialect);
            }
            "address" | "addr" => self.address = value("address", val)?,
            "noclear" => self.clear = false,
            "timeout" => self.timing.link_timeout_ms = value("timeout", val)?,
            "identify_timeout" => self.timing.identify_timeout_ms = value("identify_timeout", val)?,
            "settle_timeout" => self.timing.settle_timeout_ms = value("settle_timeout", val)?,
            "sweep_timeout" => self.timing.sweep_timeout_ms = value("sweep_timeout", val)?,
            "poll" => self.timing.poll_interval_ms = value("poll", val)?,
            "freq_offset" => self.freq_offset_hz = value("freq_offset", val)?,
            "ampl_offset" => self.ampl_offset_db = value("ampl_offset", val)?,
            "serial" => self.receiver_serial = Some(value("serial", val)?),
            "ref" => self.receiver_target.reference_level_dbm = value("ref", val)?,
            "center" => self.receiver_target.center_hz = value("center", val)?,
            "span" => self.receiver_target.span_hz = value("span", val)?,
            "atten" => self.receiver_target.attenuation_db = value("atten", val)?,
            "fft" => self.receiver_target.fft_size = value("fft", val)?,
            "sens" => self.receiver_target.sensitivity = lookup("sens", val, sensitivity)?,
            "points" => self.resample_points = Some(value("points", val)?),
            "op" => self.resample_op = lookup("op", val, ResampleOp::from_flag)?,
            "out" => self.output = Some(value("out", val)?),
            other => match (Dialect::from_flag(other), val) {
                (Some(dialect), None) => {
                    self.family = dialect.family();
                    self.dialect = Some(dialect);
                }
                _ => return Err(OptionsError::UnknownOption(other.to_string())),
            },
        }
        Ok(())
    }

    /// Apply a sequence of tokens in order
    pub fn apply_tokens<'a>(
        &mut self,
        tokens: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), OptionsError> {
        tokens.into_iter().try_for_each(|t| self.apply_token(t))
    }
}

/// Parse an options string on top of the defaults
pub fn parse_options(text: &str) -> Result<AcquireOptions, OptionsError> {
    let mut options = AcquireOptions::default();
    options.apply_tokens(text.split_whitespace())?;
    Ok(options)
}
