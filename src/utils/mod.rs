//! Process-level helpers shared by the binary and FFI hosts

pub mod logging;

pub use logging::{init_logger, init_logger_with_level};
