//! Logging configuration
//!
//! The `logging` section of the config file. Verbosity is expressed as
//! `EnvFilter` directives: a base level for everything plus per-target
//! overrides. Liveness components log under `frame_nudger::<component>`
//! targets (see [`super::TracingSink`]), so the driver and the watchdog can
//! be tuned independently.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::rolling::Rotation;

/// Target prefix of every record this crate emits
pub const CRATE_TARGET: &str = "frame_nudger";
pub const DRIVER_TARGET: &str = "frame_nudger::driver";
pub const WATCHDOG_TARGET: &str = "frame_nudger::watchdog";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Spelling used in filter directives
    pub fn as_str(self) -> &'static str {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    pub fn writes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }

    pub fn writes_console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }
}

/// Roll-over cadence of the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl LogRotation {
    pub(crate) fn to_rotation(self) -> Rotation {
        match self {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Logging section of the config file. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for targets without an entry in `targets`, including
    /// third-party crates
    pub level: LogLevel,

    /// Per-target overrides, e.g. `"frame_nudger::driver": "debug"`
    pub targets: BTreeMap<String, LogLevel>,

    pub format: LogFormat,
    pub output: LogOutput,

    /// Log file directory; the per-user data directory when unset
    pub directory: Option<PathBuf>,
    pub rotation: LogRotation,

    /// Show file and line of each record
    pub source_locations: bool,
    pub thread_ids: bool,
}

impl Default for LoggingConfig {
    /// Quiet dependencies, lifecycle events from this crate on the console
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            targets: BTreeMap::from([(CRATE_TARGET.to_string(), LogLevel::Info)]),
            format: LogFormat::Text,
            output: LogOutput::Console,
            directory: None,
            rotation: LogRotation::Daily,
            source_locations: false,
            thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// Unattended background agent: daily-rolled file only. Restart and
    /// retry warnings are kept; tick-rate samples are not.
    pub fn agent() -> Self {
        Self {
            output: LogOutput::File,
            directory: Some(default_log_directory()),
            ..Self::default()
        }
    }

    /// Chasing a stall interactively: driver and watchdog at debug (tick
    /// rate samples, poll configuration) with source locations
    pub fn diagnostics() -> Self {
        Self::default()
            .with_target_level(DRIVER_TARGET, LogLevel::Debug)
            .with_target_level(WATCHDOG_TARGET, LogLevel::Debug)
            .with_source_locations(true)
    }

    /// Raise this crate's records to debug, leaving dependencies alone
    pub fn verbose(self) -> Self {
        self.with_target_level(CRATE_TARGET, LogLevel::Debug)
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_target_level(mut self, target: impl Into<String>, level: LogLevel) -> Self {
        self.targets.insert(target.into(), level);
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_source_locations(mut self, enabled: bool) -> Self {
        self.source_locations = enabled;
        self
    }

    /// `EnvFilter` directive string, base level first
    pub fn filter_directives(&self) -> String {
        std::iter::once(self.level.to_string())
            .chain(
                self.targets
                    .iter()
                    .map(|(target, level)| format!("{}={}", target, level)),
            )
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Directory log files are written to
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(default_log_directory)
    }
}

fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("frame-nudger").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}
