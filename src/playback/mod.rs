//! Playback clock, seek coordination and session lifecycle

pub mod position;
pub mod session;

pub use position::{
    format_clock, samples_to_duration, PlaybackPositionTracker, PlaybackState, Seekable,
};
pub use session::PlayerSession;
