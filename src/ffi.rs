//! C FFI bindings for the spectrotap player
//!
//! This module exposes a playback session to C/Swift via C-compatible functions.
//! The host owns the audio device: it calls `spectrotap_player_render` from its
//! render callback and `spectrotap_player_tick` once per display frame.

use std::ffi::{c_char, CStr};
use std::slice;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{PlayerConfig, BAND_COUNT};
use crate::error::SeekError;
use crate::platform::HostOutput;
use crate::playback::PlayerSession;

/// Opaque wrapper around a playback session for FFI
///
/// The render path only touches `output`, which shares the source slot with
/// the session but never takes the session lock.
pub struct SpectrotapPlayer {
    session: Mutex<PlayerSession<HostOutput>>,
    output: HostOutput,
}

impl SpectrotapPlayer {
    fn new(config: PlayerConfig) -> Self {
        let output = HostOutput::new();
        Self {
            session: Mutex::new(PlayerSession::new(config, output.clone())),
            output,
        }
    }
}

// =============================================================================
// Status codes
// =============================================================================

/// Operation succeeded
pub const SPECTROTAP_OK: i32 = 0;
/// A pointer argument was null
pub const SPECTROTAP_ERR_NULL: i32 = -1;
/// The path was not valid UTF-8
pub const SPECTROTAP_ERR_PATH: i32 = -2;
/// The file could not be opened or decoded
pub const SPECTROTAP_ERR_LOAD: i32 = -3;
/// Nothing is loaded
pub const SPECTROTAP_ERR_NOT_LOADED: i32 = -4;
/// The decoder refused the seek
pub const SPECTROTAP_ERR_SEEK: i32 = -5;

fn seek_status(result: Result<(), SeekError>) -> i32 {
    match result {
        Ok(()) => SPECTROTAP_OK,
        Err(SeekError::NotLoaded) => SPECTROTAP_ERR_NOT_LOADED,
        Err(SeekError::Refused(_)) => SPECTROTAP_ERR_SEEK,
    }
}

// =============================================================================
// Player lifecycle
// =============================================================================

/// Install the crate's logger. Safe to call more than once.
#[no_mangle]
pub extern "C" fn spectrotap_init_logging() {
    crate::utils::init_logger();
}

/// Create a new player
///
/// # Arguments
/// * `ring_capacity` - Frames kept for visualization; 0 selects the default
///
/// # Returns
/// Pointer to a new SpectrotapPlayer. Must be freed with `spectrotap_player_free`.
#[no_mangle]
pub extern "C" fn spectrotap_player_new(ring_capacity: u32) -> *mut SpectrotapPlayer {
    let mut config = PlayerConfig::default();
    if ring_capacity > 0 {
        config = config.with_ring_capacity(ring_capacity as usize);
    }
    Box::into_raw(Box::new(SpectrotapPlayer::new(config)))
}

/// Free a player, stopping playback first
///
/// # Safety
/// `player` must be a valid pointer returned by `spectrotap_player_new`, or null.
/// After calling this function, the pointer is invalid and must not be used.
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_free(player: *mut SpectrotapPlayer) {
    if !player.is_null() {
        drop(Box::from_raw(player));
    }
}

/// Open an audio file and start playing it from the beginning
///
/// # Returns
/// `SPECTROTAP_OK`, or a negative `SPECTROTAP_ERR_*` code. On failure the
/// previous stream keeps playing.
///
/// # Safety
/// - `player` must be a valid pointer returned by `spectrotap_player_new`
/// - `path` must be a valid NUL-terminated string
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_load_path(
    player: *mut SpectrotapPlayer,
    path: *const c_char,
) -> i32 {
    let Some(player) = player.as_ref() else {
        return SPECTROTAP_ERR_NULL;
    };
    if path.is_null() {
        return SPECTROTAP_ERR_NULL;
    }
    let Ok(path) = CStr::from_ptr(path).to_str() else {
        return SPECTROTAP_ERR_PATH;
    };

    match player.session.lock().load_path(path) {
        Ok(()) => SPECTROTAP_OK,
        Err(_) => SPECTROTAP_ERR_LOAD,
    }
}

/// Stop playback and release the current file
///
/// # Safety
/// `player` must be a valid pointer returned by `spectrotap_player_new`
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_stop(player: *mut SpectrotapPlayer) {
    if let Some(player) = player.as_ref() {
        player.session.lock().stop();
    }
}

// =============================================================================
// Audio rendering
// =============================================================================

/// Render interleaved stereo samples into the provided buffer
///
/// Call this from your audio thread. Fills silence while paused or idle.
///
/// # Arguments
/// * `player` - Pointer to a SpectrotapPlayer
/// * `buffer` - Pointer to `frames * 2` floats, left/right interleaved
/// * `frames` - Number of stereo frames to render
///
/// # Safety
/// - `player` must be a valid pointer returned by `spectrotap_player_new`
/// - `buffer` must point to at least `frames * 2` floats of allocated memory
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_render(
    player: *mut SpectrotapPlayer,
    buffer: *mut f32,
    frames: u32,
) {
    if player.is_null() || buffer.is_null() {
        return;
    }

    let player = &*player;
    let buffer = slice::from_raw_parts_mut(buffer, frames as usize * 2);
    player.output.render_interleaved(buffer);
}

// =============================================================================
// Consumer frame
// =============================================================================

/// Advance one display frame: refresh band energies and the playback clock
///
/// # Returns
/// false if the stream ended on a decode error during this frame
///
/// # Safety
/// `player` must be a valid pointer returned by `spectrotap_player_new`
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_tick(player: *mut SpectrotapPlayer, seconds: f64) -> bool {
    let Some(player) = player.as_ref() else {
        return false;
    };
    let frame = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO);
    player.session.lock().tick(frame).is_ok()
}

/// Copy the current band energies into `out`
///
/// # Returns
/// Number of values written, at most 64
///
/// # Safety
/// - `player` must be a valid pointer returned by `spectrotap_player_new`
/// - `out` must point to at least `len` floats
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_band_energies(
    player: *mut SpectrotapPlayer,
    out: *mut f32,
    len: u32,
) -> u32 {
    if player.is_null() || out.is_null() {
        return 0;
    }

    let player = &*player;
    let out = slice::from_raw_parts_mut(out, len as usize);
    let session = player.session.lock();
    let bands = session.band_energies();
    let n = out.len().min(bands.len());
    out[..n].copy_from_slice(&bands[..n]);
    n as u32
}

/// Get the number of bands the analyzer produces
#[no_mangle]
pub extern "C" fn spectrotap_band_count() -> u32 {
    BAND_COUNT as u32
}

// =============================================================================
// Seek and pause
// =============================================================================

/// Seek to a fraction of the stream (0.0 - 1.0)
///
/// # Safety
/// `player` must be a valid pointer returned by `spectrotap_player_new`
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_request_seek(
    player: *mut SpectrotapPlayer,
    normalized: f64,
) -> i32 {
    let Some(player) = player.as_ref() else {
        return SPECTROTAP_ERR_NULL;
    };
    seek_status(player.session.lock().request_seek(normalized))
}

/// Seek while dragging; small moves under the scrub threshold are ignored
///
/// # Safety
/// `player` must be a valid pointer returned by `spectrotap_player_new`
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_scrub(player: *mut SpectrotapPlayer, normalized: f64) -> i32 {
    let Some(player) = player.as_ref() else {
        return SPECTROTAP_ERR_NULL;
    };
    seek_status(player.session.lock().scrub(normalized))
}

/// Toggle pause
///
/// # Returns
/// The new paused state; false when nothing is loaded
///
/// # Safety
/// `player` must be a valid pointer returned by `spectrotap_player_new`
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_toggle_pause(player: *mut SpectrotapPlayer) -> bool {
    match player.as_ref() {
        Some(player) => player.session.lock().toggle_pause(),
        None => false,
    }
}

/// # Safety
/// `player` must be a valid pointer returned by `spectrotap_player_new`
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_is_paused(player: *mut SpectrotapPlayer) -> bool {
    match player.as_ref() {
        Some(player) => player.session.lock().is_paused(),
        None => false,
    }
}

// =============================================================================
// Position
// =============================================================================

/// Estimated playback position in seconds
///
/// # Safety
/// `player` must be a valid pointer returned by `spectrotap_player_new`
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_position_seconds(player: *mut SpectrotapPlayer) -> f64 {
    match player.as_ref() {
        Some(player) => player.session.lock().position().as_secs_f64(),
        None => 0.0,
    }
}

/// Total length of the current stream in seconds, 0 when idle
///
/// # Safety
/// `player` must be a valid pointer returned by `spectrotap_player_new`
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_duration_seconds(player: *mut SpectrotapPlayer) -> f64 {
    match player.as_ref() {
        Some(player) => player.session.lock().duration().as_secs_f64(),
        None => 0.0,
    }
}

/// Sample rate of the current stream, 0 when idle. The host should run its
/// render callback at this rate.
///
/// # Safety
/// `player` must be a valid pointer returned by `spectrotap_player_new`
#[no_mangle]
pub unsafe extern "C" fn spectrotap_player_sample_rate(player: *mut SpectrotapPlayer) -> u32 {
    match player.as_ref() {
        Some(player) => player.session.lock().sample_rate(),
        None => 0,
    }
}
