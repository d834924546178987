//! Acquired traces
//!
//! A [`TraceBuffer`] holds calibrated amplitudes together with the frequency
//! range they cover. Sample `i` of `n` sits at the center of its bucket:
//!
//! ```text
//! freq[i] = min_hz + (i + 0.5) * (max_hz - min_hz) / n
//! ```

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::resample::{resample, ResampleOp};

/// Strongest sample of a trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Sample index
    pub index: usize,
    /// Bucket-center frequency
    pub freq_hz: f64,
    /// Amplitude
    pub dbm: f64,
}

/// Calibrated trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceBuffer {
    /// Amplitudes in dBm
    pub amplitudes: Vec<f64>,
    /// Lower edge of the first bucket
    pub min_hz: f64,
    /// Upper edge of the last bucket
    pub max_hz: f64,
}

impl TraceBuffer {
    /// Create a trace covering `min_hz..max_hz`
    pub fn new(amplitudes: Vec<f64>, min_hz: f64, max_hz: f64) -> Self {
        Self {
            amplitudes,
            min_hz,
            max_hz,
        }
    }

    /// A trace with no points
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.amplitudes.len()
    }

    /// Whether the trace has no points
    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }

    /// Bucket-center frequency of sample `i`
    pub fn frequency(&self, i: usize) -> f64 {
        let n = self.len().max(1) as f64;
        self.min_hz + (i as f64 + 0.5) * (self.max_hz - self.min_hz) / n
    }

    /// `(frequency, amplitude)` pairs in order
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.amplitudes
            .iter()
            .enumerate()
            .map(|(i, &dbm)| (self.frequency(i), dbm))
    }

    /// Strongest sample; the first one wins a tie
    pub fn peak(&self) -> Option<Peak> {
        self.amplitudes
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((i, v)),
            })
            .map(|(index, dbm)| Peak {
                index,
                freq_hz: self.frequency(index),
                dbm,
            })
    }

    /// Resample to `points` samples over the same frequency range
    pub fn resampled(&self, points: usize, op: ResampleOp) -> Self {
        Self::new(resample(&self.amplitudes, points, op), self.min_hz, self.max_hz)
    }

    /// Write newline-separated `freq_hz,amplitude_dbm` pairs
    pub fn write_pairs<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (freq, dbm) in self.points() {
            writeln!(out, "{},{}", freq, dbm)?;
        }
        Ok(())
    }
}
