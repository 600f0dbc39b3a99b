//! Logger setup for the terminal player and embedding hosts

use log::LevelFilter;

/// Initialize the logger at INFO, overridable through `RUST_LOG`.
///
/// Lines start with `\r` so they stay readable while the terminal is in raw
/// mode. Safe to call more than once; later calls are ignored.
pub fn init_logger() {
    init_logger_with_level(LevelFilter::Info);
}

/// [`init_logger`] with an explicit default level.
/// Returns false if a logger was already installed.
pub fn init_logger_with_level(level: LevelFilter) -> bool {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "\r[{} {:5} {}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.module_path().unwrap_or("spectrotap"),
                record.args()
            )
        })
        .try_init()
        .is_ok()
}
