//! Decoder capability and per-format adapters
//!
//! A decoder is anything that can report its sample rate and length, stream
//! frames, seek to a sample offset and release its backing resource. Formats
//! are chosen through a dispatch table keyed on file extension, falling back
//! to sniffing the first bytes of the file.

pub mod compressed;
pub mod memory;
pub mod wav;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::LoadError;
use crate::playback::Seekable;
use crate::source::FrameSource;

pub use compressed::CompressedDecoder;
pub use memory::MemoryDecoder;
pub use wav::WavDecoder;

/// A seekable stream of decoded stereo frames
pub trait Decoder: FrameSource + Seekable {
    /// Frames per second
    fn sample_rate(&self) -> u32;

    /// Length of the stream in frames (samples per channel)
    fn total_samples(&self) -> u64;

    /// Release the backing resource. Reads after closing report end-of-stream.
    fn close(&mut self);

    /// Error that ended the stream early, if any. Cleared by the call.
    fn take_error(&mut self) -> Option<String> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
}

type OpenFn = fn(File, AudioFormat) -> Result<Box<dyn Decoder>, LoadError>;

struct FormatEntry {
    format: AudioFormat,
    extensions: &'static [&'static str],
    sniff: fn(&[u8]) -> bool,
    open: OpenFn,
}

const FORMATS: &[FormatEntry] = &[
    FormatEntry {
        format: AudioFormat::Wav,
        extensions: &["wav", "wave"],
        sniff: |header| header.len() >= 12 && &header[..4] == b"RIFF" && &header[8..12] == b"WAVE",
        open: WavDecoder::open_boxed,
    },
    FormatEntry {
        format: AudioFormat::Flac,
        extensions: &["flac"],
        sniff: |header| header.starts_with(b"fLaC"),
        open: CompressedDecoder::open_boxed,
    },
    FormatEntry {
        format: AudioFormat::Mp3,
        extensions: &["mp3"],
        sniff: |header| {
            header.starts_with(b"ID3")
                || (header.len() >= 2 && header[0] == 0xFF && header[1] & 0xE0 == 0xE0)
        },
        open: CompressedDecoder::open_boxed,
    },
];

/// Bytes read from the start of a file for content sniffing
const SNIFF_LEN: usize = 12;

impl AudioFormat {
    /// Match a file extension, case-insensitively
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        FORMATS
            .iter()
            .find(|entry| entry.extensions.contains(&ext.as_str()))
            .map(|entry| entry.format)
    }

    /// Identify a format from the leading bytes of a file
    pub fn sniff(header: &[u8]) -> Option<Self> {
        FORMATS
            .iter()
            .find(|entry| (entry.sniff)(header))
            .map(|entry| entry.format)
    }

    /// Extension handed to symphonia's probe as a hint
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
        }
    }

    fn entry(&self) -> &'static FormatEntry {
        // Every variant has exactly one table row
        FORMATS
            .iter()
            .find(|entry| entry.format == *self)
            .unwrap_or(&FORMATS[0])
    }
}

/// Open a file with the decoder matching its extension or content
pub fn open_path(path: impl AsRef<Path>) -> Result<Box<dyn Decoder>, LoadError> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(AudioFormat::from_extension);

    let format = match by_extension {
        Some(format) => format,
        None => {
            let mut header = [0u8; SNIFF_LEN];
            let read = read_prefix(&mut file, &mut header)?;
            file.seek(SeekFrom::Start(0))?;
            AudioFormat::sniff(&header[..read]).ok_or_else(|| {
                LoadError::UnsupportedFormat(
                    path.extension()
                        .and_then(|ext| ext.to_str())
                        .map(|ext| format!(".{ext}"))
                        .unwrap_or_else(|| path.display().to_string()),
                )
            })?
        }
    };

    log::debug!("Opening {} as {:?}", path.display(), format);
    (format.entry().open)(file, format)
}

fn read_prefix(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_dispatch_is_case_insensitive() {
        assert_eq!(AudioFormat::from_extension("wav"), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::from_extension("WAV"), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::from_extension("Mp3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension("FLAC"), Some(AudioFormat::Flac));
        assert_eq!(AudioFormat::from_extension("ogg"), None);
    }

    #[test]
    fn test_content_sniffing() {
        assert_eq!(
            AudioFormat::sniff(b"RIFF\x24\x00\x00\x00WAVEfmt "),
            Some(AudioFormat::Wav)
        );
        assert_eq!(AudioFormat::sniff(b"fLaC\x00\x00\x00\x22"), Some(AudioFormat::Flac));
        assert_eq!(AudioFormat::sniff(b"ID3\x04\x00"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::sniff(&[0xFF, 0xFB, 0x90, 0x00]), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::sniff(b"OggS\x00\x02"), None);
        assert_eq!(AudioFormat::sniff(b""), None);
    }

    #[test]
    fn test_every_format_has_a_table_entry() {
        for format in [AudioFormat::Wav, AudioFormat::Mp3, AudioFormat::Flac] {
            assert_eq!(format.entry().format, format);
        }
    }
}
