/* spectrotap - terminal audio player with a live loudness strip.
Plays a WAV, MP3 or FLAC file through the default output device and draws
64 band energies of what is currently coming out of the speakers.
*/

#[cfg(feature = "native")]
use std::io::{self, Write};
#[cfg(feature = "native")]
use std::path::PathBuf;
#[cfg(feature = "native")]
use std::time::{Duration, Instant};

#[cfg(feature = "native")]
use clap::Parser;
#[cfg(feature = "native")]
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
};

#[cfg(feature = "native")]
use spectrotap::config::{
    PlayerConfig, DEFAULT_RING_CAPACITY, DEFAULT_SMOOTHING_FACTOR, DEFAULT_SNAPSHOT_FRAMES,
    DEFAULT_TICK_RATE_HZ,
};
#[cfg(feature = "native")]
use spectrotap::platform::{AudioOutput, CpalOutput};
#[cfg(feature = "native")]
use spectrotap::playback::{format_clock, PlaybackState, PlayerSession};

/// Fraction of the stream moved by the arrow keys
#[cfg(feature = "native")]
const SEEK_STEP: f64 = 0.05;

#[cfg(feature = "native")]
const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[cfg(feature = "native")]
#[derive(Parser)]
#[command(name = "spectrotap", about = "Terminal audio player with live band energies", version)]
struct Cli {
    /// Audio file to play (wav, mp3, flac)
    file: PathBuf,

    /// Frames kept in the visualization ring
    #[arg(long, default_value_t = DEFAULT_RING_CAPACITY)]
    ring_size: usize,

    /// Band smoothing factor, 0 = no smoothing
    #[arg(long, default_value_t = DEFAULT_SMOOTHING_FACTOR)]
    smoothing: f32,

    /// Display refresh rate
    #[arg(long, default_value_t = DEFAULT_TICK_RATE_HZ)]
    fps: u32,

    /// Frames analysed per refresh
    #[arg(long, default_value_t = DEFAULT_SNAPSHOT_FRAMES)]
    snapshot: usize,
}

#[cfg(feature = "native")]
fn main() -> anyhow::Result<()> {
    spectrotap::utils::init_logger();
    let cli = Cli::parse();

    let config = PlayerConfig::default()
        .with_ring_capacity(cli.ring_size)
        .with_smoothing_factor(cli.smoothing)
        .with_tick_rate(cli.fps)
        .with_snapshot_frames(cli.snapshot);

    let mut session = PlayerSession::new(config, CpalOutput::new());
    session.load_path(&cli.file)?;

    println!("{}", cli.file.display());
    println!("[Space] pause  [←/→] seek 5%  [0-9] jump  [q] quit\n");

    enable_raw_mode()?;
    execute!(io::stdout(), cursor::Hide)?;

    let result = run(&mut session);

    execute!(io::stdout(), cursor::Show)?;
    disable_raw_mode()?;
    println!("\nQuitting...");

    result
}

#[cfg(feature = "native")]
fn run<O: AudioOutput>(session: &mut PlayerSession<O>) -> anyhow::Result<()> {
    let tick_interval = session.config().tick_interval();
    let mut last_tick = Instant::now();

    loop {
        let timeout = tick_interval.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                if kind != KeyEventKind::Release && !handle_key(session, code) {
                    return Ok(());
                }
            }
        }

        let elapsed = last_tick.elapsed();
        if elapsed >= tick_interval {
            last_tick = Instant::now();
            // Errors are kept in the session for the status line
            let _ = session.tick(elapsed);
            draw_status(session)?;
        }
    }
}

/// Apply one key press. Returns false to quit.
#[cfg(feature = "native")]
fn handle_key<O: AudioOutput>(session: &mut PlayerSession<O>, code: KeyCode) -> bool {
    match code {
        KeyCode::Char(' ') => {
            session.toggle_pause();
        }
        KeyCode::Left => {
            let _ = session.request_seek((session.progress() - SEEK_STEP).max(0.0));
        }
        KeyCode::Right => {
            let _ = session.request_seek((session.progress() + SEEK_STEP).min(1.0));
        }
        KeyCode::Char(c @ '0'..='9') => {
            let tenth = c.to_digit(10).unwrap_or(0);
            let _ = session.request_seek(tenth as f64 / 10.0);
        }
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return false,
        _ => {}
    }
    true
}

#[cfg(feature = "native")]
fn draw_status<O: AudioOutput>(session: &PlayerSession<O>) -> io::Result<()> {
    let state = match session.state() {
        PlaybackState::Playing => "▶",
        PlaybackState::Paused => "⏸",
        PlaybackState::Idle => "■",
    };

    let strip: String = session
        .band_energies()
        .iter()
        .map(|&e| LEVELS[((e * (LEVELS.len() - 1) as f32).round() as usize).min(LEVELS.len() - 1)])
        .collect();

    let mut stdout = io::stdout();
    execute!(stdout, Clear(ClearType::CurrentLine))?;
    write!(
        stdout,
        "\r{} {} / {} |{}|",
        state,
        format_clock(session.position()),
        format_clock(session.duration()),
        strip
    )?;
    if let Some(err) = session.last_error() {
        write!(stdout, " {}", err)?;
    }
    stdout.flush()
}

#[cfg(not(feature = "native"))]
fn main() {
    println!("This binary is only available with the 'native' feature enabled.");
}
