//! One playback session: decoder, tap, analyzer and clock behind a single owner
//!
//! The producer side (the output's render callback) only ever sees a
//! [`TappedSource`] wrapping the shared decoder handle. Everything else lives
//! here and is driven from the consumer thread through [`PlayerSession::tick`].

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::position::{PlaybackPositionTracker, PlaybackState};
use crate::config::{PlayerConfig, BAND_COUNT};
use crate::decoder::{self, Decoder};
use crate::error::{LoadError, PlayerError, PlayerResult, SeekError};
use crate::platform::AudioOutput;
use crate::source::{Frame, FrameSource};
use crate::visualization::{BandEnergyAnalyzer, RingBufferTap, TappedSource};

/// Decoder handle shared by the session and the producer.
///
/// Its lock is the coarse control lock: seek and close take it, so they can
/// never interleave with a read in flight.
type SharedDecoder = Arc<Mutex<Box<dyn Decoder>>>;

/// Producer-side view of the shared decoder
struct DecoderSource {
    decoder: SharedDecoder,
}

impl FrameSource for DecoderSource {
    fn read_frames(&mut self, buf: &mut [Frame]) -> (usize, bool) {
        self.decoder.lock().read_frames(buf)
    }
}

struct LoadedStream {
    decoder: SharedDecoder,
    tap: RingBufferTap,
    generation: u64,
}

pub struct PlayerSession<O: AudioOutput> {
    config: PlayerConfig,
    output: O,
    tracker: PlaybackPositionTracker,
    analyzer: BandEnergyAnalyzer,
    current: Option<LoadedStream>,
    snapshot: Vec<Frame>,
    snapshot_epoch: u64,
    generation: u64,
    /// Generation of the most recent stream whose end the producer signalled
    ended: Arc<AtomicU64>,
    last_error: Option<String>,
}

impl<O: AudioOutput> PlayerSession<O> {
    pub fn new(config: PlayerConfig, output: O) -> Self {
        Self {
            tracker: PlaybackPositionTracker::new(config.seek_debounce),
            analyzer: BandEnergyAnalyzer::new(config.smoothing_factor),
            snapshot: Vec::with_capacity(config.snapshot_frames),
            config,
            output,
            current: None,
            snapshot_epoch: 0,
            generation: 0,
            ended: Arc::new(AtomicU64::new(0)),
            last_error: None,
        }
    }

    /// Open `path` with the matching decoder and start playing it
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        let decoder = match decoder::open_path(path) {
            Ok(decoder) => decoder,
            Err(e) => {
                log::warn!("Failed to open {}: {}", path.display(), e);
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };
        log::info!("Loaded {}", path.display());
        self.load(decoder)
    }

    /// Replace the current stream with `decoder` and start playing from zero.
    ///
    /// Nothing about the running session changes unless the output accepts
    /// the new stream's sample rate.
    pub fn load(&mut self, mut decoder: Box<dyn Decoder>) -> Result<(), LoadError> {
        let sample_rate = decoder.sample_rate();
        let total_samples = decoder.total_samples();

        if sample_rate == 0 {
            decoder.close();
            let err = LoadError::Decode("stream reports a zero sample rate".to_string());
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        if self.output.sample_rate() != sample_rate {
            log::debug!(
                "Reconfiguring output from {} Hz to {} Hz",
                self.output.sample_rate(),
                sample_rate
            );
            // Hold the old source silent so it never plays at the new rate
            self.output.pause(true);
            if let Err(e) = self.output.initialize(sample_rate) {
                self.output.pause(self.tracker.is_paused());
                decoder.close();
                let err = LoadError::from(e);
                log::warn!("{}", err);
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        }

        self.stop();

        self.generation += 1;
        let generation = self.generation;
        let decoder: SharedDecoder = Arc::new(Mutex::new(decoder));
        let tap = RingBufferTap::new(self.config.ring_capacity);

        let source = TappedSource::new(
            DecoderSource {
                decoder: decoder.clone(),
            },
            tap.clone(),
        );
        let on_complete = {
            let decoder = decoder.clone();
            let ended = self.ended.clone();
            Box::new(move || {
                decoder.lock().close();
                ended.store(generation, Ordering::Release);
            })
        };

        self.output.pause(false);
        if let Err(e) = self.output.play(Box::new(source), on_complete) {
            decoder.lock().close();
            let err = LoadError::from(e);
            log::warn!("{}", err);
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        self.analyzer.reset();
        self.tracker.load(sample_rate, total_samples);
        self.current = Some(LoadedStream {
            decoder,
            tap,
            generation,
        });
        self.last_error = None;

        log::info!(
            "Playing {} frames at {} Hz ({})",
            total_samples,
            sample_rate,
            super::format_clock(self.tracker.duration())
        );
        Ok(())
    }

    /// Stop playback: clear the output, close the decoder, then drop the tap
    pub fn stop(&mut self) {
        let Some(stream) = self.current.take() else {
            return;
        };

        if let Some(msg) = self.teardown(stream) {
            log::debug!("Discarding decoder error on stop: {}", msg);
        }
        log::info!("Playback stopped");
    }

    /// One consumer frame: refresh the bands from a fresh snapshot, reap a
    /// finished stream, then advance the clock by `frame_duration`.
    ///
    /// Returns the error that ended the stream, if the decoder failed.
    pub fn tick(&mut self, frame_duration: Duration) -> PlayerResult<()> {
        let Some(stream) = &self.current else {
            self.tracker.tick(frame_duration);
            return Ok(());
        };

        self.snapshot_epoch = stream
            .tap
            .snapshot_into(self.config.snapshot_frames, &mut self.snapshot);
        self.analyzer.update(&self.snapshot);

        let mut result = Ok(());
        if self.ended.load(Ordering::Acquire) == stream.generation {
            if let Some(err) = self.finish_stream() {
                result = Err(err);
            }
        }

        self.tracker.tick(frame_duration);
        result
    }

    fn finish_stream(&mut self) -> Option<PlayerError> {
        let stream = self.current.take()?;

        match self.teardown(stream) {
            Some(msg) => {
                let err = PlayerError::Io(msg);
                log::warn!("Stream ended early: {}", err);
                self.last_error = Some(err.to_string());
                Some(err)
            }
            None => {
                log::info!("Stream finished");
                None
            }
        }
    }

    /// Release a stream in order (output, decoder, tap) and discard
    /// everything derived from it. Returns the decoder's pending error.
    fn teardown(&mut self, stream: LoadedStream) -> Option<String> {
        self.output.clear();
        let error = {
            let mut decoder = stream.decoder.lock();
            decoder.close();
            decoder.take_error()
        };
        drop(stream.tap);

        self.tracker.on_stream_ended();
        self.analyzer.reset();
        self.snapshot.clear();
        self.snapshot_epoch = 0;
        error
    }

    /// Seek to a fraction of the stream. Requests inside the debounce
    /// window are dropped and report success.
    pub fn request_seek(&mut self, normalized: f64) -> Result<(), SeekError> {
        let Some(stream) = &self.current else {
            return Err(SeekError::NotLoaded);
        };

        let mut decoder = stream.decoder.lock();
        match self.tracker.request_seek(normalized, &mut **decoder) {
            Ok(Some(offset)) => {
                log::debug!("Seeked to sample {}", offset);
                Ok(())
            }
            Ok(None) => {
                log::debug!("Seek to {:.3} debounced", normalized);
                Ok(())
            }
            Err(e) => {
                log::warn!("Seek failed: {}", e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Seek while dragging: ignored unless the target differs from the
    /// current progress by more than the scrub threshold
    pub fn scrub(&mut self, normalized: f64) -> Result<(), SeekError> {
        if self.current.is_none() {
            return Err(SeekError::NotLoaded);
        }
        let target = if normalized.is_nan() {
            0.0
        } else {
            normalized.clamp(0.0, 1.0)
        };
        if (target - self.tracker.progress()).abs() <= self.config.scrub_threshold {
            return Ok(());
        }
        self.request_seek(target)
    }

    /// Flip pause. Returns the new paused flag, false while idle.
    pub fn toggle_pause(&mut self) -> bool {
        if self.current.is_none() {
            return false;
        }
        let paused = self.tracker.toggle_pause();
        self.output.pause(paused);
        log::info!("{}", if paused { "Paused" } else { "Resumed" });
        paused
    }

    pub fn band_energies(&self) -> &[f32; BAND_COUNT] {
        self.analyzer.bands()
    }

    /// Frames the last tick analysed, oldest first
    pub fn last_snapshot(&self) -> &[Frame] {
        &self.snapshot
    }

    /// Tap epoch at the last tick's snapshot
    pub fn snapshot_epoch(&self) -> u64 {
        self.snapshot_epoch
    }

    /// Up to `n` of the most recently played frames, straight from the tap
    pub fn snapshot(&self, n: usize) -> Vec<Frame> {
        self.current
            .as_ref()
            .map(|stream| stream.tap.snapshot(n))
            .unwrap_or_default()
    }

    pub fn position(&self) -> Duration {
        self.tracker.position()
    }

    pub fn duration(&self) -> Duration {
        self.tracker.duration()
    }

    pub fn progress(&self) -> f64 {
        self.tracker.progress()
    }

    pub fn state(&self) -> PlaybackState {
        self.tracker.state()
    }

    pub fn is_paused(&self) -> bool {
        self.tracker.is_paused()
    }

    pub fn has_stream(&self) -> bool {
        self.current.is_some()
    }

    pub fn sample_rate(&self) -> u32 {
        self.tracker.sample_rate()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

impl<O: AudioOutput> Drop for PlayerSession<O> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::MemoryDecoder;
    use crate::platform::HostOutput;

    fn session() -> (PlayerSession<HostOutput>, HostOutput) {
        let output = HostOutput::new();
        let config = PlayerConfig::default()
            .with_ring_capacity(64)
            .with_snapshot_frames(32)
            .with_seek_debounce(Duration::ZERO);
        (PlayerSession::new(config, output.clone()), output)
    }

    #[test]
    fn test_idle_session() {
        let (mut session, _) = session();

        assert_eq!(session.state(), PlaybackState::Idle);
        assert!(!session.has_stream());
        assert!(!session.toggle_pause());
        assert_eq!(session.request_seek(0.5), Err(SeekError::NotLoaded));
        assert!(session.tick(Duration::from_millis(16)).is_ok());
        assert_eq!(session.position(), Duration::ZERO);
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        let (mut session, _) = session();
        let result = session.load(Box::new(MemoryDecoder::new(vec![[0.1, 0.1]; 8], 0)));

        assert!(matches!(result, Err(LoadError::Decode(_))));
        assert!(session.last_error().is_some());
        assert!(!session.has_stream());
    }

    #[test]
    fn test_snapshot_follows_rendered_frames() {
        let (mut session, output) = session();
        let frames: Vec<Frame> = (0..100).map(|i| [i as f32, i as f32]).collect();
        session
            .load(Box::new(MemoryDecoder::new(frames, 1000)))
            .unwrap();

        let mut buf = [[0.0; 2]; 10];
        output.render(&mut buf);
        session.tick(Duration::from_millis(10)).unwrap();

        assert_eq!(session.last_snapshot().len(), 10);
        assert_eq!(session.last_snapshot()[9], [9.0, 9.0]);
        assert_eq!(session.snapshot_epoch(), 10);
        assert_eq!(session.snapshot(3), vec![[7.0, 7.0], [8.0, 8.0], [9.0, 9.0]]);
    }
}
