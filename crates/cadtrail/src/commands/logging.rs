//! Logging initialization for the CLI.

use cadtrail_core::config::LogLevel;
use cadtrail_util::log::{self, LogConfig};

/// Initialize logging to stderr.
///
/// Quiet by default so command output stays parseable; `--verbose` or a
/// configured level turns it on. `RUST_LOG` still wins when set.
pub fn init_logging(verbose: bool, configured: Option<LogLevel>) {
    let level = match (verbose, configured) {
        (true, _) => log::LogLevel::Debug,
        (false, Some(level)) => level.into(),
        (false, None) => log::LogLevel::Warn,
    };

    log::init(LogConfig {
        level,
        stderr: true,
        with_location: verbose,
    });
}
