//! Platform abstraction for audio output
//! This module provides a unified sink interface for playback across different
//! platforms (native CPAL device, or a host that pulls audio itself, e.g. iOS)

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::OutputError;
use crate::source::{fill_silence, Frame, FrameSource};

/// Invoked once, from the producer context, after a source is exhausted
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

/// Trait for platform-specific audio sinks
pub trait AudioOutput {
    /// Prepare the output for streams at `sample_rate`, reinitialising if the rate changed
    fn initialize(&mut self, sample_rate: u32) -> Result<(), OutputError>;

    /// Start streaming `source`, replacing anything currently playing
    fn play(
        &mut self,
        source: Box<dyn FrameSource>,
        on_complete: CompletionCallback,
    ) -> Result<(), OutputError>;

    /// Pause or resume delivery; paused output is silence and consumes nothing
    fn pause(&mut self, paused: bool);

    /// Stop immediately and drop the current source without signalling completion
    fn clear(&mut self);

    /// Get the current sample rate (0 before initialisation)
    fn sample_rate(&self) -> u32;

    /// Check if a source is attached
    fn is_active(&self) -> bool;
}

struct ActiveSource {
    source: Box<dyn FrameSource>,
    on_complete: CompletionCallback,
}

/// Source slot shared between the control side and the producer callback.
///
/// The slot lock serialises source swaps and `clear` against in-flight
/// rendering, so once `clear` returns the producer can no longer touch the
/// old source.
pub struct OutputCore {
    slot: Mutex<Option<ActiveSource>>,
    paused: AtomicBool,
}

impl OutputCore {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            paused: AtomicBool::new(false),
        }
    }

    pub fn play(&self, source: Box<dyn FrameSource>, on_complete: CompletionCallback) {
        let previous = self.slot.lock().replace(ActiveSource {
            source,
            on_complete,
        });
        drop(previous);
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        let previous = self.slot.lock().take();
        drop(previous);
    }

    pub fn is_active(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Fill `out` from the current source, padding with silence.
    ///
    /// Runs on the real-time producer thread. When the source reports the
    /// end of its stream it is detached first, then its completion callback
    /// runs outside the slot lock. Returns the number of source frames.
    pub fn render(&self, out: &mut [Frame]) -> usize {
        if self.is_paused() {
            fill_silence(out);
            return 0;
        }

        let mut filled = 0;
        let finished = {
            let mut slot = self.slot.lock();
            let Some(active) = slot.as_mut() else {
                drop(slot);
                fill_silence(out);
                return 0;
            };

            let mut more = true;
            while filled < out.len() {
                let (n, has_more) = active.source.read_frames(&mut out[filled..]);
                filled += n;
                if !has_more {
                    more = false;
                    break;
                }
                if n == 0 {
                    break;
                }
            }

            if more {
                None
            } else {
                slot.take()
            }
        };

        fill_silence(&mut out[filled..]);

        if let Some(ActiveSource {
            source,
            on_complete,
        }) = finished
        {
            drop(source);
            on_complete();
        }

        filled
    }

    /// [`render`](Self::render) into an interleaved stereo `f32` buffer
    pub fn render_interleaved(&self, out: &mut [f32]) -> usize {
        let mut scratch = [[0.0f32; 2]; RENDER_CHUNK];
        let mut total = 0;

        for chunk in out.chunks_mut(RENDER_CHUNK * 2) {
            let frames = chunk.len() / 2;
            total += self.render(&mut scratch[..frames]);
            for (dst, frame) in chunk.chunks_exact_mut(2).zip(scratch.iter()) {
                dst.copy_from_slice(frame);
            }
            // An odd trailing sample has no partner frame
            if chunk.len() % 2 == 1 {
                if let Some(last) = chunk.last_mut() {
                    *last = 0.0;
                }
            }
        }

        total
    }
}

impl Default for OutputCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Frames rendered per stack chunk when converting to device layout
pub(crate) const RENDER_CHUNK: usize = 512;

pub mod host_output;
pub use self::host_output::HostOutput;

// Platform-specific implementations
#[cfg(feature = "native")]
pub mod cpal_output;

#[cfg(feature = "native")]
pub use self::cpal_output::CpalOutput;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct Ramp {
        next: usize,
        end: usize,
    }

    impl FrameSource for Ramp {
        fn read_frames(&mut self, buf: &mut [Frame]) -> (usize, bool) {
            let n = buf.len().min(self.end - self.next);
            for (i, slot) in buf[..n].iter_mut().enumerate() {
                let v = (self.next + i + 1) as f32;
                *slot = [v, v];
            }
            self.next += n;
            (n, self.next < self.end)
        }
    }

    #[test]
    fn test_render_without_source_is_silent() {
        let core = OutputCore::new();
        let mut out = [[1.0, 1.0]; 8];

        assert_eq!(core.render(&mut out), 0);
        assert!(out.iter().all(|f| *f == [0.0, 0.0]));
    }

    #[test]
    fn test_completion_fires_once_after_detach() {
        let core = Arc::new(OutputCore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        core.play(
            Box::new(Ramp { next: 0, end: 10 }),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let mut out = [[0.0, 0.0]; 8];
        assert_eq!(core.render(&mut out), 8);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(core.render(&mut out), 2);
        assert_eq!(out[1], [10.0, 10.0]);
        assert_eq!(out[2], [0.0, 0.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!core.is_active());

        core.render(&mut out);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_paused_render_consumes_nothing() {
        let core = OutputCore::new();
        core.play(Box::new(Ramp { next: 0, end: 100 }), Box::new(|| {}));

        core.set_paused(true);
        let mut out = [[0.0, 0.0]; 4];
        assert_eq!(core.render(&mut out), 0);

        core.set_paused(false);
        core.render(&mut out);
        assert_eq!(out[0], [1.0, 1.0]);
    }

    #[test]
    fn test_clear_drops_source_without_completion() {
        let core = OutputCore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        core.play(
            Box::new(Ramp { next: 0, end: 4 }),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        core.clear();
        let mut out = [[0.0, 0.0]; 8];
        assert_eq!(core.render(&mut out), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_render_interleaved_layout() {
        let core = OutputCore::new();
        core.play(Box::new(Ramp { next: 0, end: 3 }), Box::new(|| {}));

        let mut out = [9.0f32; 7];
        assert_eq!(core.render_interleaved(&mut out), 3);
        assert_eq!(out, [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 0.0]);
    }
}
