//! Decoder over frames already held in memory

use std::f32::consts::TAU;

use super::Decoder;
use crate::error::SeekError;
use crate::playback::Seekable;
use crate::source::{Frame, FrameSource};

/// Plays back a fixed buffer of frames, e.g. a generated test signal
pub struct MemoryDecoder {
    frames: Vec<Frame>,
    sample_rate: u32,
    position: usize,
    closed: bool,
}

impl MemoryDecoder {
    pub fn new(frames: Vec<Frame>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
            position: 0,
            closed: false,
        }
    }

    /// A stereo sine tone
    pub fn sine(frequency_hz: f32, amplitude: f32, seconds: f32, sample_rate: u32) -> Self {
        let len = (seconds.max(0.0) * sample_rate as f32).round() as usize;
        let amplitude = amplitude.clamp(0.0, 1.0);
        let frames = (0..len)
            .map(|i| {
                let phase = TAU * frequency_hz * i as f32 / sample_rate as f32;
                let v = amplitude * phase.sin();
                [v, v]
            })
            .collect();
        Self::new(frames, sample_rate)
    }

    /// Current read offset in frames
    pub fn position(&self) -> u64 {
        self.position as u64
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FrameSource for MemoryDecoder {
    fn read_frames(&mut self, buf: &mut [Frame]) -> (usize, bool) {
        if self.closed {
            return (0, false);
        }
        let remaining = &self.frames[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        (n, self.position < self.frames.len())
    }
}

impl Seekable for MemoryDecoder {
    fn seek(&mut self, sample_offset: u64) -> Result<(), SeekError> {
        if self.closed {
            return Err(SeekError::NotLoaded);
        }
        if sample_offset >= self.frames.len() as u64 {
            return Err(SeekError::Refused(format!(
                "offset {} beyond {} frames",
                sample_offset,
                self.frames.len()
            )));
        }
        self.position = sample_offset as usize;
        Ok(())
    }
}

impl Decoder for MemoryDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_samples(&self) -> u64 {
        self.frames.len() as u64
    }

    fn close(&mut self) {
        self.closed = true;
        self.frames = Vec::new();
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_then_reports_end() {
        let frames: Vec<Frame> = (0..10).map(|i| [i as f32, i as f32]).collect();
        let mut decoder = MemoryDecoder::new(frames.clone(), 8000);
        let mut buf = [[0.0; 2]; 6];

        assert_eq!(decoder.read_frames(&mut buf), (6, true));
        assert_eq!(&buf[..], &frames[..6]);
        assert_eq!(decoder.read_frames(&mut buf), (4, false));
        assert_eq!(&buf[..4], &frames[6..]);
        assert_eq!(decoder.read_frames(&mut buf), (0, false));
    }

    #[test]
    fn test_seek_bounds() {
        let mut decoder = MemoryDecoder::sine(440.0, 0.5, 1.0, 1000);
        assert_eq!(decoder.total_samples(), 1000);

        assert!(decoder.seek(999).is_ok());
        assert_eq!(decoder.position(), 999);
        assert!(matches!(decoder.seek(1000), Err(SeekError::Refused(_))));
    }

    #[test]
    fn test_close_ends_stream() {
        let mut decoder = MemoryDecoder::sine(440.0, 0.5, 1.0, 1000);
        decoder.close();

        let mut buf = [[0.0; 2]; 4];
        assert_eq!(decoder.read_frames(&mut buf), (0, false));
        assert_eq!(decoder.seek(0), Err(SeekError::NotLoaded));
        assert!(decoder.is_closed());
    }
}
