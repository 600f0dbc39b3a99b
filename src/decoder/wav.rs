//! WAV decoding via hound

use std::fs::File;
use std::io::BufReader;

use hound::{SampleFormat, WavReader};

use super::{AudioFormat, Decoder};
use crate::error::{LoadError, SeekError};
use crate::playback::Seekable;
use crate::source::{Frame, FrameSource};

#[derive(Clone, Copy, Debug)]
enum Encoding {
    Float,
    /// Integer PCM, scaled into [-1, 1) by `1 / 2^(bits - 1)`
    Int { scale: f32 },
}

/// Streaming PCM WAV decoder
pub struct WavDecoder {
    reader: Option<WavReader<BufReader<File>>>,
    encoding: Encoding,
    channels: u16,
    sample_rate: u32,
    total_samples: u64,
    position: u64,
    error: Option<String>,
}

impl WavDecoder {
    pub fn open(file: File) -> Result<Self, LoadError> {
        let reader =
            WavReader::new(BufReader::new(file)).map_err(|e| LoadError::Decode(e.to_string()))?;
        let spec = reader.spec();

        if spec.channels == 0 {
            return Err(LoadError::NoTrack);
        }

        let encoding = match spec.sample_format {
            SampleFormat::Float if spec.bits_per_sample == 32 => Encoding::Float,
            SampleFormat::Int if (1..=32).contains(&spec.bits_per_sample) => Encoding::Int {
                scale: 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32,
            },
            _ => {
                return Err(LoadError::UnsupportedFormat(format!(
                    "{}-bit {:?} WAV",
                    spec.bits_per_sample, spec.sample_format
                )))
            }
        };

        let total_samples = reader.duration() as u64;
        log::debug!(
            "WAV: {} Hz, {} ch, {} frames, {:?}",
            spec.sample_rate,
            spec.channels,
            total_samples,
            encoding
        );

        Ok(Self {
            reader: Some(reader),
            encoding,
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            total_samples,
            position: 0,
            error: None,
        })
    }

    pub(super) fn open_boxed(file: File, _format: AudioFormat) -> Result<Box<dyn Decoder>, LoadError> {
        Ok(Box::new(Self::open(file)?))
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Pull whole frames from an interleaved sample iterator.
///
/// Mono is duplicated to both sides; channels beyond the second are dropped.
/// A trailing partial frame is discarded. Frames completed before a read
/// error are kept and counted alongside the error.
fn fill_frames<I>(samples: &mut I, channels: usize, buf: &mut [Frame]) -> (usize, Option<hound::Error>)
where
    I: Iterator<Item = Result<f32, hound::Error>>,
{
    for (filled, slot) in buf.iter_mut().enumerate() {
        match read_frame(samples, channels) {
            Ok(Some(frame)) => *slot = frame,
            Ok(None) => return (filled, None),
            Err(e) => return (filled, Some(e)),
        }
    }
    (buf.len(), None)
}

fn read_frame<I>(samples: &mut I, channels: usize) -> Result<Option<Frame>, hound::Error>
where
    I: Iterator<Item = Result<f32, hound::Error>>,
{
    let Some(left) = samples.next().transpose()? else {
        return Ok(None);
    };
    let right = if channels >= 2 {
        match samples.next().transpose()? {
            Some(right) => right,
            None => return Ok(None),
        }
    } else {
        left
    };
    for _ in 2..channels {
        if samples.next().transpose()?.is_none() {
            return Ok(None);
        }
    }
    Ok(Some([left, right]))
}

impl FrameSource for WavDecoder {
    fn read_frames(&mut self, buf: &mut [Frame]) -> (usize, bool) {
        let Some(reader) = self.reader.as_mut() else {
            return (0, false);
        };
        let channels = self.channels as usize;

        let (n, error) = match self.encoding {
            Encoding::Float => fill_frames(&mut reader.samples::<f32>(), channels, buf),
            Encoding::Int { scale } => fill_frames(
                &mut reader.samples::<i32>().map(|s| s.map(|v| v as f32 * scale)),
                channels,
                buf,
            ),
        };
        self.position += n as u64;

        match error {
            None => (n, n == buf.len() && self.position < self.total_samples),
            Some(e) => {
                log::warn!("WAV read failed after {} frames: {}", self.position, e);
                self.error = Some(e.to_string());
                (n, false)
            }
        }
    }
}

impl Seekable for WavDecoder {
    fn seek(&mut self, sample_offset: u64) -> Result<(), SeekError> {
        let reader = self.reader.as_mut().ok_or(SeekError::NotLoaded)?;
        let offset = u32::try_from(sample_offset)
            .map_err(|_| SeekError::Refused(format!("offset {sample_offset} out of range")))?;

        reader
            .seek(offset)
            .map_err(|e| SeekError::Refused(e.to_string()))?;
        self.position = sample_offset;
        Ok(())
    }
}

impl Decoder for WavDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_samples(&self) -> u64 {
        self.total_samples
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }
}
