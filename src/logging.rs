//! A minimal stderr backend for the `log` facade, for use by the binaries.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= log::max_level()
  }

  fn log(&self, record: &Record) {
    if self.enabled(record.metadata()) {
      eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
    }
  }

  fn flush(&self) {}
}

/// Install the logger. Verbose mode shows per-chunk and per-block events.
pub fn init(verbose: bool) -> Result<(), SetLoggerError> {
  log::set_logger(&LOGGER)?;
  log::set_max_level(if verbose {
    LevelFilter::Debug
  } else {
    LevelFilter::Warn
  });
  Ok(())
}
