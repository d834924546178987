//! Virtual direct-digital receiver

use sa_protocol::{ReceiverBackend, ReceiverGeometry, ReceiverTarget, Sensitivity, TransportError};
use tracing::debug;

/// Simulated USB receiver with a single carrier at the center of the sweep
#[derive(Debug, Default)]
pub struct VirtualReceiver {
    serial: String,
    target: Option<ReceiverTarget>,
    open: bool,
    sweeps: u32,
    fail_sweeps: bool,
}

impl VirtualReceiver {
    /// Create a closed receiver
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            ..Default::default()
        }
    }

    /// Make every subsequent sweep fail (unplugged device)
    pub fn unplug(&mut self) {
        self.fail_sweeps = true;
    }

    /// Number of sweeps delivered
    pub fn sweeps(&self) -> u32 {
        self.sweeps
    }

    /// Whether the device is open
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Target applied by the last `configure`
    pub fn target(&self) -> Option<&ReceiverTarget> {
        self.target.as_ref()
    }

    fn noise_floor(target: &ReceiverTarget) -> f64 {
        let gain = match target.sensitivity {
            Sensitivity::Low => 0.0,
            Sensitivity::Mid => 10.0,
            Sensitivity::High => 20.0,
        };
        -120.0 + target.attenuation_db - gain
    }
}

impl ReceiverBackend for VirtualReceiver {
    fn open(&mut self, serial: Option<&str>) -> Result<String, TransportError> {
        if let Some(wanted) = serial {
            if wanted != self.serial {
                return Err(TransportError::OpenFailed {
                    address: wanted.to_string(),
                    reason: "no receiver with that serial number".into(),
                });
            }
        }
        self.open = true;
        Ok(format!("Virtual DDR {}", self.serial))
    }

    fn configure(&mut self, target: &ReceiverTarget) -> Result<ReceiverGeometry, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        if target.span_hz <= 0.0 || target.fft_size < 2 {
            return Err(TransportError::Bus(format!(
                "unsupported span {} Hz / FFT size {}",
                target.span_hz, target.fft_size
            )));
        }

        let points = target.fft_size;
        let geometry = ReceiverGeometry {
            points,
            start_hz: target.start_hz(),
            stop_hz: target.stop_hz(),
            rbw_hz: target.span_hz / points as f64 * 1.5,
            sweep_seconds: points as f64 / target.span_hz.max(1.0),
        };
        debug!("Virtual receiver configured: {:?}", geometry);
        self.target = Some(target.clone());
        Ok(geometry)
    }

    fn sweep(&mut self) -> Result<Vec<f64>, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        if self.fail_sweeps {
            return Err(TransportError::Io("device disconnected".into()));
        }
        let target = self.target.as_ref().ok_or(TransportError::NotOpen)?;

        let n = target.fft_size;
        let floor = Self::noise_floor(target);
        let carrier = target.reference_level_dbm - 20.0;
        self.sweeps += 1;

        Ok((0..n)
            .map(|i| if i == n / 2 { carrier } else { floor + (i % 3) as f64 })
            .collect())
    }

    fn close(&mut self) {
        self.open = false;
    }
}
