//! Logging module.
//!
//! The remote helper owns `stdout` for the protocol spoken with git, so
//! everything here goes to `stderr`.
use std::io;
use std::io::Write;

use log::{Level, Log, Metadata, Record, SetLoggerError};

/// The level used when `RUST_LOG` is not set.
pub const DEFAULT_LEVEL: Level = Level::Warn;

/// A logger that logs to `stderr`.
pub struct StderrLogger {
    level: Level,
}

impl StderrLogger {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!(
                "{:<5} {:<14} {}",
                record.level(),
                record.target(),
                record.args()
            );
            // Nowhere left to report a failing stderr.
            writeln!(&mut io::stderr(), "{message}").ok();
        }
    }

    fn flush(&self) {
        io::stderr().flush().ok();
    }
}

/// Initialize the stderr logger, honoring `RUST_LOG` if set.
pub fn init() -> Result<(), SetLoggerError> {
    let level = env_level().unwrap_or(DEFAULT_LEVEL);
    set(StderrLogger::new(level), level)
}

/// Set a logger.
pub fn set(logger: impl Log + 'static, level: Level) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level.to_level_filter());

    Ok(())
}

/// Get the level set by the environment variable `RUST_LOG`, if
/// present.
pub fn env_level() -> Option<Level> {
    let level = std::env::var("RUST_LOG").ok()?;
    level.parse().ok()
}
