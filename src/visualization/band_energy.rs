//! Banded loudness analysis
//!
//! Splits a snapshot of recent frames into [`BAND_COUNT`] contiguous time
//! segments and turns each into a smoothed, compressed RMS magnitude. This is
//! a loudness picture of the recent past, not a frequency spectrum.

use crate::config::{BAND_COUNT, DEFAULT_SMOOTHING_FACTOR, MAGNITUDE_EXPONENT};
use crate::source::Frame;

/// Smoothed per-segment loudness in [0, 1]
pub struct BandEnergyAnalyzer {
    bands: [f32; BAND_COUNT],
    smoothing_factor: f32,
}

impl BandEnergyAnalyzer {
    /// Create an analyzer with all bands at zero.
    ///
    /// # Arguments
    /// * `smoothing_factor` - Share of the previous value kept per update, clamped to [0, 1)
    pub fn new(smoothing_factor: f32) -> Self {
        let smoothing_factor = if smoothing_factor.is_finite() {
            smoothing_factor.clamp(0.0, 0.999)
        } else {
            DEFAULT_SMOOTHING_FACTOR
        };

        Self {
            bands: [0.0; BAND_COUNT],
            smoothing_factor,
        }
    }

    /// Recompute every band that receives at least one frame from `snapshot`.
    ///
    /// Segment size is `ceil(N / BAND_COUNT)`, so trailing segments may be
    /// short or empty. Empty segments keep their previous value.
    pub fn update(&mut self, snapshot: &[Frame]) {
        if snapshot.is_empty() {
            return;
        }

        let segment_len = snapshot.len().div_ceil(BAND_COUNT);
        let history = self.smoothing_factor;

        for (band, segment) in self.bands.iter_mut().zip(snapshot.chunks(segment_len)) {
            let magnitude = segment_magnitude(segment);
            if !magnitude.is_finite() {
                continue;
            }

            let smoothed = history * *band + (1.0 - history) * magnitude;
            *band = smoothed.clamp(0.0, 1.0);
        }
    }

    /// Current band values, lowest index = oldest part of the snapshot
    pub fn bands(&self) -> &[f32; BAND_COUNT] {
        &self.bands
    }

    pub fn smoothing_factor(&self) -> f32 {
        self.smoothing_factor
    }

    /// Zero all bands (new stream)
    pub fn reset(&mut self) {
        self.bands = [0.0; BAND_COUNT];
    }
}

impl Default for BandEnergyAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_FACTOR)
    }
}

/// `rms(mono)^0.3` over a non-empty segment
#[inline]
fn segment_magnitude(segment: &[Frame]) -> f32 {
    let sum_squares: f32 = segment
        .iter()
        .map(|[left, right]| {
            let mono = (left + right) * 0.5;
            mono * mono
        })
        .sum();

    let rms = (sum_squares / segment.len() as f32).sqrt();
    rms.powf(MAGNITUDE_EXPONENT)
}
