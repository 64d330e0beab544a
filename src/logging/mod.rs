//! Logging system for frame-nudger
//!
//! Provides:
//! - Structured logs with per-target verbosity
//! - Console and rolling-file outputs, text or JSON
//! - An injectable [`LogSink`] capability for the liveness components

mod config;
mod sink;


pub use config::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, CRATE_TARGET, DRIVER_TARGET,
    WATCHDOG_TARGET,
};
pub use sink::{LogRecord, LogSink, Logger, MemorySink, TracingSink};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging system errors
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    InitializationError(String),

    #[error("Failed to create log directory {path:?}: {source}")]
    DirectoryCreationError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for logging operations
pub type LoggingResult<T> = Result<T, LoggingError>;

const LOG_FILE_NAME: &str = "frame-nudger.log";

/// Process-wide subscriber state. Hold it for the life of the process so
/// the non-blocking file writer flushes on exit.
pub struct LoggingSystem {
    config: LoggingConfig,
    _guard: Option<WorkerGuard>,
}

impl LoggingSystem {
    /// Install the global `tracing` subscriber described by `config`
    pub fn init(config: LoggingConfig) -> LoggingResult<Self> {
        let mut guard = None;
        let file_layer = if config.output.writes_file() {
            let directory = config.resolved_directory();
            std::fs::create_dir_all(&directory).map_err(|source| {
                LoggingError::DirectoryCreationError {
                    path: directory.clone(),
                    source,
                }
            })?;
            let (layer, worker) = Self::file_layer(&config, &directory);
            guard = Some(worker);
            Some(layer)
        } else {
            None
        };
        let console_layer = config
            .output
            .writes_console()
            .then(|| Self::console_layer(&config));

        tracing_subscriber::registry()
            .with(Self::build_env_filter(&config))
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggingError::InitializationError(e.to_string()))?;

        Ok(Self {
            config,
            _guard: guard,
        })
    }

    /// Filter from the configured directives. A malformed override falls
    /// back to the base level alone.
    pub(crate) fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
        EnvFilter::try_new(config.filter_directives())
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()))
    }

    fn console_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_thread_ids(config.thread_ids)
            .with_file(config.source_locations)
            .with_line_number(config.source_locations);

        match config.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Text => layer.boxed(),
        }
    }

    fn file_layer<S>(
        config: &LoggingConfig,
        directory: &Path,
    ) -> (Box<dyn Layer<S> + Send + Sync>, WorkerGuard)
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let appender =
            RollingFileAppender::new(config.rotation.to_rotation(), directory, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_thread_ids(config.thread_ids)
            .with_file(config.source_locations)
            .with_line_number(config.source_locations);

        let layer = match config.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Text => layer.boxed(),
        };
        (layer, guard)
    }

    /// Directory holding the log file, when file output is enabled
    pub fn log_directory(&self) -> Option<PathBuf> {
        self.config
            .output
            .writes_file()
            .then(|| self.config.resolved_directory())
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }
}
