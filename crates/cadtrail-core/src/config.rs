//! Configuration management for cadtrail.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/cadtrail/config.json` (or `cadtrail.jsonc`)
//! 2. Environment variable: `CADTRAIL_CONFIG_CONTENT`
//! 3. Project config: `cadtrail.jsonc` or `cadtrail.json` next to the
//!    tracked documents
//!
//! Supports JSONC (JSON with comments) and variable substitution:
//! - `{env:VAR_NAME}` - Substitute environment variable
//! - `{file:path}` - Substitute file contents
//!
//! [`Config::resolve`] turns the merged, all-optional config into concrete
//! [`TrackerSettings`].

use crate::error::{ConfigError, CoreResult};
use cadtrail_snapshot::DEFAULT_TOLERANCE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable holding inline config content.
pub const CONFIG_CONTENT_ENV: &str = "CADTRAIL_CONFIG_CONTENT";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1500;
pub const MIN_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_MAX_SNAPSHOTS: usize = 50;
pub const DEFAULT_EVENT_BATCH_SIZE: usize = 10;

/// Static regex for variable substitution, compiled once.
static VAR_REGEX: OnceLock<Result<regex::Regex, regex::Error>> = OnceLock::new();

fn var_regex() -> Result<&'static regex::Regex, ConfigError> {
    VAR_REGEX
        .get_or_init(|| regex::Regex::new(r"\{(env|file):([^}]+)\}"))
        .as_ref()
        .map_err(|e| ConfigError::Validation {
            message: format!("substitution pattern: {e}"),
        })
}

/// Raw configuration as read from files; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON Schema reference.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// Change detection cadence in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// Longest snapshot chain kept per document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_snapshots: Option<usize>,

    /// Pending change events flushed to the log at once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_batch_size: Option<usize>,

    /// Commit an automatic snapshot after this many change events, 0 disables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_snapshot_threshold: Option<usize>,

    /// Numeric drift ignored when comparing captured values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_tolerance: Option<f64>,

    /// Directory holding the history database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Root for per-document blob folders, default is next to each document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_root: Option<PathBuf>,

    /// Directory scanned for legacy flat-file histories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_dir: Option<PathBuf>,
}

/// Log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for cadtrail_util::log::LogLevel {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::Trace,
            LogLevel::Debug => Self::Debug,
            LogLevel::Info => Self::Info,
            LogLevel::Warn => Self::Warn,
            LogLevel::Error => Self::Error,
        }
    }
}

/// Validated settings the tracker runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    pub max_snapshots: usize,
    pub event_batch_size: usize,
    /// 0 disables automatic snapshots.
    pub auto_snapshot_threshold: usize,
    pub tolerance: f64,
    pub data_dir: PathBuf,
    pub history_root: Option<PathBuf>,
    pub legacy_dir: PathBuf,
}

impl TrackerSettings {
    /// Default settings with everything stored under `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            event_batch_size: DEFAULT_EVENT_BATCH_SIZE,
            auto_snapshot_threshold: 0,
            tolerance: DEFAULT_TOLERANCE,
            legacy_dir: data_dir.join("legacy"),
            history_root: None,
            data_dir,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Loading order (later sources override earlier):
    /// 1. Global config from `~/.config/cadtrail/`
    /// 2. `CADTRAIL_CONFIG_CONTENT` environment variable
    /// 3. Project config from `project_dir`
    pub async fn load(project_dir: Option<&Path>) -> CoreResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        if let Some(global_dir) = Self::global_config_dir() {
            for name in &["config.json", "cadtrail.jsonc"] {
                let path = global_dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        if let Ok(content) = std::env::var(CONFIG_CONTENT_ENV) {
            config = config.merge(Self::parse_jsonc(&content, "<env>")?);
        }

        if let Some(dir) = project_dir {
            for name in &["cadtrail.jsonc", "cadtrail.json"] {
                let path = dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        Ok((config, sources))
    }

    /// Get the global config directory.
    ///
    /// On Unix, prefers `~/.config/cadtrail` over the platform directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            if let Some(home) = dirs::home_dir() {
                let xdg_config = home.join(".config").join("cadtrail");
                if xdg_config.exists() {
                    return Some(xdg_config);
                }
            }
        }

        cadtrail_util::path::config_dir()
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::substitute_variables(&content, path)?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Parse JSONC (JSON with comments).
    pub fn parse_jsonc(content: &str, source: &str) -> CoreResult<Self> {
        let stripped = Self::strip_comments(content);

        serde_json::from_str(&stripped).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Strip `//` and `/* */` comments outside of strings.
    fn strip_comments(input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_string = false;
        let mut escape_next = false;

        while let Some(c) = chars.next() {
            if escape_next {
                result.push(c);
                escape_next = false;
                continue;
            }

            if c == '\\' && in_string {
                result.push(c);
                escape_next = true;
                continue;
            }

            if c == '"' {
                in_string = !in_string;
                result.push(c);
                continue;
            }

            if in_string {
                result.push(c);
                continue;
            }

            if c == '/' {
                match chars.peek() {
                    Some('/') => {
                        chars.next();
                        for c in chars.by_ref() {
                            if c == '\n' {
                                result.push('\n');
                                break;
                            }
                        }
                        continue;
                    }
                    Some('*') => {
                        chars.next();
                        let mut prev = ' ';
                        for c in chars.by_ref() {
                            if prev == '*' && c == '/' {
                                break;
                            }
                            // Keep line numbers stable for parse errors
                            if c == '\n' {
                                result.push('\n');
                            }
                            prev = c;
                        }
                        continue;
                    }
                    _ => {}
                }
            }

            result.push(c);
        }

        result
    }

    /// Substitute `{env:NAME}` and `{file:path}` references.
    fn substitute_variables(content: &str, config_path: &Path) -> CoreResult<String> {
        let config_dir = config_path.parent().unwrap_or(Path::new("."));
        let mut result = content.to_string();

        for cap in var_regex()?.captures_iter(content) {
            let (Some(full_match), Some(kind), Some(value)) = (cap.get(0), cap.get(1), cap.get(2))
            else {
                continue;
            };
            let value = value.as_str();

            let replacement = match kind.as_str() {
                "env" => std::env::var(value).map_err(|_| ConfigError::EnvVarNotFound {
                    name: value.to_string(),
                })?,
                "file" => {
                    let file_path = config_dir.join(value);
                    std::fs::read_to_string(&file_path)
                        .map_err(|_| ConfigError::FileRefNotFound {
                            path: file_path.display().to_string(),
                        })?
                        .trim()
                        .to_string()
                }
                _ => continue,
            };

            result = result.replace(full_match.as_str(), &replacement);
        }

        Ok(result)
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(self, other: Self) -> Self {
        Self {
            schema: merge_option(self.schema, other.schema),
            log_level: merge_option(self.log_level, other.log_level),
            poll_interval_ms: merge_option(self.poll_interval_ms, other.poll_interval_ms),
            max_snapshots: merge_option(self.max_snapshots, other.max_snapshots),
            event_batch_size: merge_option(self.event_batch_size, other.event_batch_size),
            auto_snapshot_threshold: merge_option(
                self.auto_snapshot_threshold,
                other.auto_snapshot_threshold,
            ),
            dimension_tolerance: merge_option(self.dimension_tolerance, other.dimension_tolerance),
            data_dir: merge_option(self.data_dir, other.data_dir),
            history_root: merge_option(self.history_root, other.history_root),
            legacy_dir: merge_option(self.legacy_dir, other.legacy_dir),
        }
    }

    /// Fill defaults and validate.
    pub fn resolve(&self) -> CoreResult<TrackerSettings> {
        let poll_interval_ms = self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        if poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(ConfigError::validation(format!(
                "poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}, got {poll_interval_ms}"
            ))
            .into());
        }

        let max_snapshots = self.max_snapshots.unwrap_or(DEFAULT_MAX_SNAPSHOTS);
        if max_snapshots == 0 {
            return Err(ConfigError::validation("max_snapshots must be at least 1").into());
        }

        let event_batch_size = self.event_batch_size.unwrap_or(DEFAULT_EVENT_BATCH_SIZE);
        if event_batch_size == 0 {
            return Err(ConfigError::validation("event_batch_size must be at least 1").into());
        }

        let tolerance = self.dimension_tolerance.unwrap_or(DEFAULT_TOLERANCE);
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ConfigError::validation(format!(
                "dimension_tolerance must be a non-negative number, got {tolerance}"
            ))
            .into());
        }

        let data_dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => cadtrail_util::path::data_dir().ok_or_else(|| {
                ConfigError::InvalidPath("Could not determine data directory".to_string())
            })?,
        };
        let legacy_dir = self
            .legacy_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("legacy"));

        Ok(TrackerSettings {
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_snapshots,
            event_batch_size,
            auto_snapshot_threshold: self.auto_snapshot_threshold.unwrap_or(0),
            tolerance,
            data_dir,
            history_root: self.history_root.clone(),
            legacy_dir,
        })
    }
}

fn merge_option<T>(base: Option<T>, other: Option<T>) -> Option<T> {
    match (base, other) {
        (_, Some(o)) => Some(o),
        (b, None) => b,
    }
}
