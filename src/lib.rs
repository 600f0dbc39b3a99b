//! Audio playback with a live visualization tap, for native (CPAL) and embedding hosts

pub mod config;
pub mod error;
pub mod source;

pub mod decoder;
pub mod playback;
pub mod visualization;

// Platform abstraction layer
pub mod platform;

pub mod utils;

// C bindings (iOS and other embedding hosts)
pub mod ffi;

pub use config::PlayerConfig;
pub use error::{LoadError, OutputError, PlayerError, PlayerResult, SeekError};
pub use playback::{PlaybackPositionTracker, PlaybackState, PlayerSession};
pub use source::{Frame, FrameSource};
pub use visualization::{BandEnergyAnalyzer, RingBufferTap, TappedSource};
