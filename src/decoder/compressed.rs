//! MP3 and FLAC decoding via symphonia

use std::fs::File;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{AudioFormat, Decoder};
use crate::error::{LoadError, SeekError};
use crate::playback::Seekable;
use crate::source::{Frame, FrameSource};

struct Stream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn CodecDecoder>,
}

/// Packet-based decoder for compressed formats
pub struct CompressedDecoder {
    stream: Option<Stream>,
    track_id: u32,
    sample_rate: u32,
    total_samples: u64,
    sample_buf: Option<SampleBuffer<f32>>,
    /// Read offset into `sample_buf`, in interleaved samples
    sample_idx: usize,
    channels: usize,
    /// Frames still to drop after a seek landed before its target
    skip_frames: u64,
    finished: bool,
    error: Option<String>,
}

impl CompressedDecoder {
    pub fn open(file: File, format_hint: AudioFormat) -> Result<Self, LoadError> {
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(format_hint.extension());

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| LoadError::Decode(format!("Probe error: {}", e)))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoTrack)?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| LoadError::Decode("Unknown sample rate".to_string()))?;
        let total_samples = track.codec_params.n_frames.unwrap_or(0);
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(2)
            .max(1);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(format!("Codec error: {}", e)))?;

        if total_samples == 0 {
            log::warn!("{:?} stream has no frame count; seeking disabled", format_hint);
        }
        log::debug!(
            "{:?}: {} Hz, {} ch, {} frames",
            format_hint,
            sample_rate,
            channels,
            total_samples
        );

        Ok(Self {
            stream: Some(Stream { format, decoder }),
            track_id,
            sample_rate,
            total_samples,
            sample_buf: None,
            sample_idx: 0,
            channels,
            skip_frames: 0,
            finished: false,
            error: None,
        })
    }

    pub(super) fn open_boxed(file: File, format: AudioFormat) -> Result<Box<dyn Decoder>, LoadError> {
        Ok(Box::new(Self::open(file, format)?))
    }

    fn buffered(&self) -> &[f32] {
        match &self.sample_buf {
            Some(buf) => &buf.samples()[self.sample_idx..],
            None => &[],
        }
    }

    /// Decode the next packet of our track into `sample_buf`.
    /// Returns false at end of stream or on a fatal error.
    fn refill(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };

        loop {
            let packet = match stream.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return false;
                }
                Err(SymphoniaError::ResetRequired) => {
                    stream.decoder.reset();
                    continue;
                }
                Err(e) => {
                    self.error = Some(e.to_string());
                    return false;
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match stream.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let needed = decoded.capacity() as u64;
                    let channels = spec.channels.count().max(1);
                    let reuse = channels == self.channels
                        && self
                            .sample_buf
                            .as_ref()
                            .is_some_and(|buf| buf.capacity() as u64 >= needed * channels as u64);
                    if !reuse {
                        self.sample_buf = Some(SampleBuffer::new(needed, spec));
                    }
                    self.channels = channels;
                    if let Some(buf) = self.sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                    }
                    self.sample_idx = 0;
                    return true;
                }
                // Corrupt packet: skip it and keep going
                Err(SymphoniaError::DecodeError(msg)) => {
                    log::debug!("Skipping undecodable packet: {}", msg);
                }
                Err(e) => {
                    self.error = Some(e.to_string());
                    return false;
                }
            }
        }
    }
}

impl FrameSource for CompressedDecoder {
    fn read_frames(&mut self, buf: &mut [Frame]) -> (usize, bool) {
        if self.finished || self.stream.is_none() {
            return (0, false);
        }

        let mut filled = 0;
        while filled < buf.len() {
            if self.buffered().len() < self.channels {
                if !self.refill() {
                    self.finished = true;
                    return (filled, false);
                }
                continue;
            }

            let channels = self.channels;
            let samples = self.buffered();
            let available = samples.len() / channels;

            if self.skip_frames > 0 {
                let skip = (self.skip_frames.min(available as u64)) as usize;
                self.skip_frames -= skip as u64;
                self.sample_idx += skip * channels;
                continue;
            }

            let n = available.min(buf.len() - filled);
            for (slot, frame) in buf[filled..filled + n]
                .iter_mut()
                .zip(samples.chunks_exact(channels))
            {
                *slot = if channels >= 2 {
                    [frame[0], frame[1]]
                } else {
                    [frame[0], frame[0]]
                };
            }
            self.sample_idx += n * channels;
            filled += n;
        }

        (filled, true)
    }
}

impl Seekable for CompressedDecoder {
    fn seek(&mut self, sample_offset: u64) -> Result<(), SeekError> {
        let stream = self.stream.as_mut().ok_or(SeekError::NotLoaded)?;

        let seeked = stream
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: sample_offset,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| SeekError::Refused(e.to_string()))?;

        stream.decoder.reset();
        self.sample_buf = None;
        self.sample_idx = 0;
        self.skip_frames = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.finished = false;
        Ok(())
    }
}

impl Decoder for CompressedDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_samples(&self) -> u64 {
        self.total_samples
    }

    fn close(&mut self) {
        self.stream = None;
        self.sample_buf = None;
        self.finished = true;
    }

    fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }
}
