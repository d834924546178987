//! Direct-digital receiver seam
//!
//! The USB receiver has no command grammar: the host computes every setting
//! and pushes it down, then asks for a sweep of power samples in dBm.

use crate::transport::TransportError;

/// Receiver sensitivity (front-end gain/preamp trade-off)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sensitivity {
    /// Preamp off, maximum linearity
    Low,
    /// Preamp off, reduced attenuation
    #[default]
    Mid,
    /// Preamp on
    High,
}

/// Host-side control target for the receiver
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReceiverTarget {
    /// Top-of-screen reference level
    pub reference_level_dbm: f64,
    /// Center frequency
    pub center_hz: f64,
    /// Sweep span
    pub span_hz: f64,
    /// Input attenuation
    pub attenuation_db: f64,
    /// FFT length per acquisition block
    pub fft_size: usize,
    /// Front-end sensitivity
    pub sensitivity: Sensitivity,
}

impl Default for ReceiverTarget {
    fn default() -> Self {
        Self {
            reference_level_dbm: -10.0,
            center_hz: 100_000_000.0,
            span_hz: 10_000_000.0,
            attenuation_db: 10.0,
            fft_size: 1024,
            sensitivity: Sensitivity::Mid,
        }
    }
}

impl ReceiverTarget {
    /// Sweep start frequency
    pub fn start_hz(&self) -> f64 {
        self.center_hz - self.span_hz / 2.0
    }

    /// Sweep stop frequency
    pub fn stop_hz(&self) -> f64 {
        self.center_hz + self.span_hz / 2.0
    }
}

/// Sweep geometry the receiver settled on for a target
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverGeometry {
    /// Samples per sweep
    pub points: usize,
    /// First frequency covered
    pub start_hz: f64,
    /// Last frequency covered
    pub stop_hz: f64,
    /// Effective resolution bandwidth
    pub rbw_hz: f64,
    /// Time for one sweep
    pub sweep_seconds: f64,
}

/// Driver for a USB direct-digital receiver
pub trait ReceiverBackend {
    /// Open the receiver and return its identification
    fn open(&mut self, serial: Option<&str>) -> Result<String, TransportError>;

    /// Apply a control target
    fn configure(&mut self, target: &ReceiverTarget) -> Result<ReceiverGeometry, TransportError>;

    /// Acquire one sweep of power samples in dBm
    fn sweep(&mut self) -> Result<Vec<f64>, TransportError>;

    /// Release the device
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_edges() {
        let target = ReceiverTarget {
            center_hz: 1e6,
            span_hz: 2e5,
            ..Default::default()
        };
        assert_eq!(target.start_hz(), 900_000.0);
        assert_eq!(target.stop_hz(), 1_100_000.0);
    }
}
