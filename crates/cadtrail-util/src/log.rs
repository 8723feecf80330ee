//! Tracing subscriber setup shared by the CLI and embedding applications.
//!
//! The configured level applies to the cadtrail crates only; everything else
//! stays at `warn`. `RUST_LOG` replaces the whole filter when set.

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{fmt as fmt_layer, prelude::*, EnvFilter};

/// Crates whose output follows the configured level.
const CADTRAIL_TARGETS: &[&str] = &[
    "cadtrail",
    "cadtrail_core",
    "cadtrail_host",
    "cadtrail_snapshot",
    "cadtrail_storage",
    "cadtrail_util",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ]
        .into_iter()
        .find(|level| level.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("unknown log level: {s}"))
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Write formatted events to stderr. Without it only the filter is
    /// installed, which keeps spans cheap for embedders with their own sink.
    pub stderr: bool,
    /// Include source file and line in each line.
    pub with_location: bool,
}

impl LogConfig {
    /// Filter directives for this config, e.g. `warn,cadtrail_core=debug`.
    pub fn directives(&self) -> String {
        let mut directives = vec![LogLevel::Warn.as_str().to_string()];
        directives.extend(
            CADTRAIL_TARGETS
                .iter()
                .map(|target| format!("{target}={}", self.level)),
        );
        directives.join(",")
    }
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed; the existing
/// one is left in place.
pub fn init(config: LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directives()));
    let registry = tracing_subscriber::registry().with(filter);

    if !config.stderr {
        return registry.try_init().is_ok();
    }

    let layer = fmt_layer::layer()
        .with_writer(std::io::stderr)
        .with_target(config.with_location)
        .with_file(config.with_location)
        .with_line_number(config.with_location);
    registry.with(layer).try_init().is_ok()
}
