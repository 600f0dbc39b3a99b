//! Playback clock and seek coordination
//!
//! Position is estimated by advancing a clock once per consumer tick. Seeks
//! are debounced and always go through a single canonical unit, the sample
//! offset, so duration and frame arithmetic can never drift apart.

use std::time::{Duration, Instant};

use crate::config::DEFAULT_SEEK_DEBOUNCE;
use crate::error::SeekError;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Capability to reposition a stream at a sample offset
pub trait Seekable {
    fn seek(&mut self, sample_offset: u64) -> Result<(), SeekError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Estimated position of the current stream.
///
/// Invariant: `0 <= position <= duration` at all times.
#[derive(Debug)]
pub struct PlaybackPositionTracker {
    state: PlaybackState,
    position: Duration,
    total: Duration,
    sample_rate: u32,
    total_samples: u64,
    last_seek: Option<Instant>,
    debounce: Duration,
}

impl PlaybackPositionTracker {
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: PlaybackState::Idle,
            position: Duration::ZERO,
            total: Duration::ZERO,
            sample_rate: 0,
            total_samples: 0,
            last_seek: None,
            debounce,
        }
    }

    /// Start tracking a freshly loaded stream from position zero
    pub fn load(&mut self, sample_rate: u32, total_samples: u64) {
        self.state = PlaybackState::Playing;
        self.sample_rate = sample_rate;
        self.total_samples = total_samples;
        self.position = Duration::ZERO;
        self.total = samples_to_duration(total_samples, sample_rate);
        self.last_seek = None;
    }

    /// Advance the clock by one render frame while playing
    pub fn tick(&mut self, frame_duration: Duration) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.position = self.position.saturating_add(frame_duration).min(self.total);
    }

    /// Seek to a fraction of the stream, debounced against the wall clock.
    ///
    /// Returns `Ok(None)` when the request fell inside the debounce window
    /// and was ignored, or `Ok(Some(offset))` with the sample offset reached.
    pub fn request_seek<S: Seekable + ?Sized>(
        &mut self,
        normalized: f64,
        seeker: &mut S,
    ) -> Result<Option<u64>, SeekError> {
        self.request_seek_at(normalized, Instant::now(), seeker)
    }

    /// [`request_seek`](Self::request_seek) with an explicit current instant
    pub fn request_seek_at<S: Seekable + ?Sized>(
        &mut self,
        normalized: f64,
        now: Instant,
        seeker: &mut S,
    ) -> Result<Option<u64>, SeekError> {
        if self.state == PlaybackState::Idle || self.total_samples == 0 || self.sample_rate == 0 {
            return Err(SeekError::NotLoaded);
        }

        if let Some(last) = self.last_seek {
            if now.saturating_duration_since(last) < self.debounce {
                return Ok(None);
            }
        }

        let offset = self.target_offset(normalized);
        seeker.seek(offset)?;

        self.position = samples_to_duration(offset, self.sample_rate).min(self.total);
        self.last_seek = Some(now);
        Ok(Some(offset))
    }

    /// Sample offset for a normalized position, clamped into the stream
    pub fn target_offset(&self, normalized: f64) -> u64 {
        let normalized = if normalized.is_nan() {
            0.0
        } else {
            normalized.clamp(0.0, 1.0)
        };

        let offset = (normalized * self.total_samples as f64).round() as u64;
        offset.min(self.total_samples.saturating_sub(1))
    }

    /// Flip between playing and paused. Returns the new paused flag;
    /// does nothing while idle.
    pub fn toggle_pause(&mut self) -> bool {
        self.state = match self.state {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused => PlaybackState::Playing,
            PlaybackState::Idle => PlaybackState::Idle,
        };
        self.is_paused()
    }

    /// The stream finished or was stopped
    pub fn on_stream_ended(&mut self) {
        self.state = PlaybackState::Idle;
        self.position = Duration::ZERO;
        self.total = Duration::ZERO;
        self.sample_rate = 0;
        self.total_samples = 0;
        self.last_seek = None;
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn duration(&self) -> Duration {
        self.total
    }

    /// Position as a fraction of the duration, 0 when nothing is loaded
    pub fn progress(&self) -> f64 {
        if self.total.is_zero() {
            return 0.0;
        }
        self.position.as_secs_f64() / self.total.as_secs_f64()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }
}

impl Default for PlaybackPositionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SEEK_DEBOUNCE)
    }
}

/// Exact conversion from a sample count to wall time
pub fn samples_to_duration(samples: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let nanos = samples as u128 * NANOS_PER_SEC / sample_rate as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}

/// Format a duration as MM:SS
pub fn format_clock(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeSeeker {
        calls: Vec<u64>,
        refuse: bool,
    }

    impl Seekable for FakeSeeker {
        fn seek(&mut self, sample_offset: u64) -> Result<(), SeekError> {
            self.calls.push(sample_offset);
            if self.refuse {
                return Err(SeekError::Refused("unseekable".to_string()));
            }
            Ok(())
        }
    }

    fn ten_second_track() -> PlaybackPositionTracker {
        let mut tracker = PlaybackPositionTracker::default();
        tracker.load(44100, 441_000);
        tracker
    }

    #[test]
    fn test_seek_to_middle() {
        let mut tracker = ten_second_track();
        let mut seeker = FakeSeeker::default();

        let offset = tracker.request_seek(0.5, &mut seeker).unwrap();

        assert_eq!(offset, Some(220_500));
        assert_eq!(seeker.calls, vec![220_500]);
        assert_eq!(tracker.position(), Duration::from_secs(5));
    }

    #[test]
    fn test_seek_past_end_clamps_to_last_sample() {
        let now = Instant::now();
        let mut over = ten_second_track();
        let mut at_end = ten_second_track();
        let mut seeker = FakeSeeker::default();

        let a = over.request_seek_at(1.5, now, &mut seeker).unwrap();
        let b = at_end.request_seek_at(1.0, now, &mut seeker).unwrap();

        assert_eq!(a, Some(440_999));
        assert_eq!(a, b);
        assert_eq!(over.position(), at_end.position());
        assert!(over.position() <= over.duration());
    }

    #[test]
    fn test_negative_and_nan_seek_clamp_to_start() {
        let tracker = ten_second_track();
        assert_eq!(tracker.target_offset(-0.3), 0);
        assert_eq!(tracker.target_offset(f64::NAN), 0);
    }

    #[test]
    fn test_second_seek_within_debounce_is_ignored() {
        let mut tracker = ten_second_track();
        let mut seeker = FakeSeeker::default();
        let start = Instant::now();

        tracker.request_seek_at(0.5, start, &mut seeker).unwrap();
        let second = tracker
            .request_seek_at(0.9, start + Duration::from_millis(20), &mut seeker)
            .unwrap();

        assert_eq!(second, None);
        assert_eq!(seeker.calls.len(), 1);
        assert_eq!(tracker.position(), Duration::from_secs(5));
    }

    #[test]
    fn test_seek_after_debounce_window_is_accepted() {
        let mut tracker = ten_second_track();
        let mut seeker = FakeSeeker::default();
        let start = Instant::now();

        tracker.request_seek_at(0.5, start, &mut seeker).unwrap();
        let second = tracker
            .request_seek_at(0.1, start + Duration::from_millis(50), &mut seeker)
            .unwrap();

        assert_eq!(second, Some(44_100));
        assert_eq!(tracker.position(), Duration::from_secs(1));
    }

    #[test]
    fn test_refused_seek_keeps_position_and_allows_retry() {
        let mut tracker = ten_second_track();
        tracker.tick(Duration::from_secs(2));
        let mut seeker = FakeSeeker {
            refuse: true,
            ..Default::default()
        };
        let start = Instant::now();

        let err = tracker.request_seek_at(0.5, start, &mut seeker).unwrap_err();
        assert!(matches!(err, SeekError::Refused(_)));
        assert_eq!(tracker.position(), Duration::from_secs(2));

        // A failed seek does not arm the debounce window
        seeker.refuse = false;
        let retry = tracker
            .request_seek_at(0.5, start + Duration::from_millis(1), &mut seeker)
            .unwrap();
        assert_eq!(retry, Some(220_500));
        assert_eq!(seeker.calls.len(), 2);
    }

    #[test]
    fn test_seek_while_idle_fails() {
        let mut tracker = PlaybackPositionTracker::default();
        let mut seeker = FakeSeeker::default();

        assert_eq!(
            tracker.request_seek(0.5, &mut seeker),
            Err(SeekError::NotLoaded)
        );
        assert!(seeker.calls.is_empty());
    }

    #[test]
    fn test_tick_advances_only_while_playing() {
        let mut tracker = ten_second_track();
        let frame = Duration::from_secs(1) / 60;

        tracker.tick(frame);
        assert_eq!(tracker.position(), frame);

        tracker.toggle_pause();
        tracker.tick(frame);
        assert_eq!(tracker.position(), frame);

        let mut idle = PlaybackPositionTracker::default();
        idle.tick(frame);
        assert_eq!(idle.position(), Duration::ZERO);
    }

    #[test]
    fn test_tick_clamps_to_total() {
        let mut tracker = ten_second_track();
        for _ in 0..1000 {
            tracker.tick(Duration::from_millis(50));
        }
        assert_eq!(tracker.position(), tracker.duration());
        assert_eq!(tracker.progress(), 1.0);
    }

    #[test]
    fn test_toggle_pause_twice_restores_state() {
        let mut tracker = ten_second_track();
        let before = tracker.is_paused();

        assert!(tracker.toggle_pause());
        assert!(!tracker.toggle_pause());
        assert_eq!(tracker.is_paused(), before);
        assert_eq!(tracker.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_toggle_pause_is_noop_when_idle() {
        let mut tracker = PlaybackPositionTracker::default();
        assert!(!tracker.toggle_pause());
        assert_eq!(tracker.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_stream_end_resets_clock() {
        let mut tracker = ten_second_track();
        tracker.tick(Duration::from_secs(3));

        tracker.on_stream_ended();

        assert_eq!(tracker.state(), PlaybackState::Idle);
        assert_eq!(tracker.position(), Duration::ZERO);
        assert_eq!(tracker.duration(), Duration::ZERO);
        assert_eq!(tracker.progress(), 0.0);
    }

    #[test]
    fn test_sample_conversion_and_clock_format() {
        assert_eq!(samples_to_duration(441_000, 44100), Duration::from_secs(10));
        assert_eq!(samples_to_duration(24_000, 48000), Duration::from_millis(500));
        assert_eq!(samples_to_duration(100, 0), Duration::ZERO);

        assert_eq!(format_clock(Duration::from_secs(0)), "00:00");
        assert_eq!(format_clock(Duration::from_secs(125)), "02:05");
        assert_eq!(format_clock(Duration::from_secs(3725)), "62:05");
    }
}
