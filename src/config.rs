//! Player configuration and default constants

use std::time::Duration;

/// Number of loudness bands produced by the analyzer
pub const BAND_COUNT: usize = 64;

/// Compressive exponent applied to each band's RMS so quiet detail stays visible
pub const MAGNITUDE_EXPONENT: f32 = 0.3;

/// Frames retained by the visual ring buffer
pub const DEFAULT_RING_CAPACITY: usize = 8192;

/// Share of the previous band value kept on every update (0.6 = 60% history)
pub const DEFAULT_SMOOTHING_FACTOR: f32 = 0.6;

/// Frames pulled from the ring per consumer tick
pub const DEFAULT_SNAPSHOT_FRAMES: usize = 2048;

/// Minimum spacing between two accepted seeks
pub const DEFAULT_SEEK_DEBOUNCE: Duration = Duration::from_millis(50);

/// Consumer tick rate in Hz
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

/// Minimum progress change (fraction of total) before a drag issues a new seek
pub const DEFAULT_SCRUB_THRESHOLD: f64 = 0.01;

/// Device buffer length requested from native outputs
pub const OUTPUT_LATENCY: Duration = Duration::from_millis(50);

/// Largest smoothing factor accepted; 1.0 would freeze the bands forever
const MAX_SMOOTHING_FACTOR: f32 = 0.999;

/// Tunables for a [`PlayerSession`](crate::playback::PlayerSession)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerConfig {
    pub ring_capacity: usize,
    pub smoothing_factor: f32,
    pub snapshot_frames: usize,
    pub seek_debounce: Duration,
    pub tick_rate_hz: u32,
    pub scrub_threshold: f64,
}

impl PlayerConfig {
    pub fn new(
        ring_capacity: usize,
        smoothing_factor: f32,
        snapshot_frames: usize,
        seek_debounce: Duration,
        tick_rate_hz: u32,
        scrub_threshold: f64,
    ) -> Self {
        Self {
            ring_capacity: ring_capacity.max(1),
            smoothing_factor: clamp_smoothing(smoothing_factor),
            snapshot_frames: snapshot_frames.max(1),
            seek_debounce,
            tick_rate_hz: tick_rate_hz.max(1),
            scrub_threshold: scrub_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity.max(1);
        self
    }

    pub fn with_smoothing_factor(mut self, factor: f32) -> Self {
        self.smoothing_factor = clamp_smoothing(factor);
        self
    }

    pub fn with_snapshot_frames(mut self, frames: usize) -> Self {
        self.snapshot_frames = frames.max(1);
        self
    }

    pub fn with_seek_debounce(mut self, debounce: Duration) -> Self {
        self.seek_debounce = debounce;
        self
    }

    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz.max(1);
        self
    }

    pub fn with_scrub_threshold(mut self, threshold: f64) -> Self {
        self.scrub_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Duration of one consumer tick
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate_hz
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_RING_CAPACITY,
            DEFAULT_SMOOTHING_FACTOR,
            DEFAULT_SNAPSHOT_FRAMES,
            DEFAULT_SEEK_DEBOUNCE,
            DEFAULT_TICK_RATE_HZ,
            DEFAULT_SCRUB_THRESHOLD,
        )
    }
}

fn clamp_smoothing(factor: f32) -> f32 {
    if factor.is_nan() {
        return DEFAULT_SMOOTHING_FACTOR;
    }
    factor.clamp(0.0, MAX_SMOOTHING_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_values() {
        let config = PlayerConfig::default();
        assert_eq!(config.ring_capacity, 8192);
        assert_eq!(config.smoothing_factor, 0.6);
        assert_eq!(config.snapshot_frames, 2048);
        assert_eq!(config.seek_debounce, Duration::from_millis(50));
        assert_eq!(config.tick_rate_hz, 60);
    }

    #[test]
    fn test_parameter_clamping() {
        let config = PlayerConfig::default()
            .with_ring_capacity(0)
            .with_smoothing_factor(1.5)
            .with_snapshot_frames(0)
            .with_tick_rate(0)
            .with_scrub_threshold(-1.0);

        assert_eq!(config.ring_capacity, 1);
        assert_eq!(config.smoothing_factor, 0.999);
        assert_eq!(config.snapshot_frames, 1);
        assert_eq!(config.tick_rate_hz, 1);
        assert_eq!(config.scrub_threshold, 0.0);

        let config = PlayerConfig::default().with_smoothing_factor(f32::NAN);
        assert_eq!(config.smoothing_factor, DEFAULT_SMOOTHING_FACTOR);
    }

    #[test]
    fn test_tick_interval() {
        let config = PlayerConfig::default().with_tick_rate(50);
        assert_eq!(config.tick_interval(), Duration::from_millis(20));
    }
}
