//! Error types for spectrotap
//!
//! Every failure is scoped to the current playback session. Ring buffer
//! overwrite is normal operation and has no variant here.

use thiserror::Error;

/// Opening or identifying a stream failed. Session state is left untouched.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("No playable audio track")]
    NoTrack,

    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

/// A seek could not be carried out. Position is left unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeekError {
    #[error("Nothing is loaded")]
    NotLoaded,

    #[error("Decoder refused seek: {0}")]
    Refused(String),
}

/// Failures from the audio output sink
#[derive(Error, Debug, Clone)]
pub enum OutputError {
    #[error("No audio output devices found")]
    NoDevice,

    #[error("Failed to get device config: {0}")]
    Config(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Anything a [`PlayerSession`](crate::playback::PlayerSession) can surface to its host
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Seek(#[from] SeekError),

    #[error("Playback I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Result type alias for player operations
pub type PlayerResult<T> = std::result::Result<T, PlayerError>;
