use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::{AudioOutput, CompletionCallback, OutputCore};
use crate::error::OutputError;
use crate::source::{Frame, FrameSource};

/// Output whose producer is driven by the host.
///
/// The host (an iOS render callback through FFI, or a test) calls
/// [`render`](Self::render) on a clone of this handle from its own thread.
#[derive(Clone)]
pub struct HostOutput {
    core: Arc<OutputCore>,
    sample_rate: Arc<AtomicU32>,
}

impl HostOutput {
    pub fn new() -> Self {
        Self {
            core: Arc::new(OutputCore::new()),
            sample_rate: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Pull the next frames for the device
    pub fn render(&self, out: &mut [Frame]) -> usize {
        self.core.render(out)
    }

    /// Pull the next frames as interleaved stereo samples
    pub fn render_interleaved(&self, out: &mut [f32]) -> usize {
        self.core.render_interleaved(out)
    }

    pub fn is_paused(&self) -> bool {
        self.core.is_paused()
    }
}

impl Default for HostOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for HostOutput {
    fn initialize(&mut self, sample_rate: u32) -> Result<(), OutputError> {
        if sample_rate == 0 {
            return Err(OutputError::Config("sample rate must be positive".to_string()));
        }
        let previous = self.sample_rate.swap(sample_rate, Ordering::AcqRel);
        if previous != sample_rate {
            log::info!("Host output configured at {} Hz", sample_rate);
        }
        Ok(())
    }

    fn play(
        &mut self,
        source: Box<dyn FrameSource>,
        on_complete: CompletionCallback,
    ) -> Result<(), OutputError> {
        if self.sample_rate() == 0 {
            return Err(OutputError::Config("output not initialized".to_string()));
        }
        self.core.play(source, on_complete);
        Ok(())
    }

    fn pause(&mut self, paused: bool) {
        self.core.set_paused(paused);
    }

    fn clear(&mut self) {
        self.core.clear();
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    fn is_active(&self) -> bool {
        self.core.is_active()
    }
}
