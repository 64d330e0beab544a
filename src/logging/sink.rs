//! Injectable logging capability
//!
//! Components receive a [`Logger`] at construction instead of reaching for a
//! process-wide logger. Records are fire-and-forget: a sink must never block
//! the caller or panic.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::config::LogLevel;

/// Destination for log records emitted by liveness components
pub trait LogSink: Send + Sync {
    /// Record one message
    fn record(&self, level: LogLevel, component: &'static str, message: fmt::Arguments<'_>);
}

macro_rules! forward {
    ($target:literal, $level:expr, $component:expr, $message:expr) => {
        match $level {
            LogLevel::Trace => tracing::trace!(target: $target, component = $component, "{}", $message),
            LogLevel::Debug => tracing::debug!(target: $target, component = $component, "{}", $message),
            LogLevel::Info => tracing::info!(target: $target, component = $component, "{}", $message),
            LogLevel::Warn => tracing::warn!(target: $target, component = $component, "{}", $message),
            LogLevel::Error => tracing::error!(target: $target, component = $component, "{}", $message),
        }
    };
}

/// Forwards records to the installed `tracing` subscriber.
///
/// Each component logs under its own target (`frame_nudger::driver`,
/// `frame_nudger::watchdog`, `frame_nudger::supervisor`) so filter
/// directives can address it; anything else logs under `frame_nudger`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, level: LogLevel, component: &'static str, message: fmt::Arguments<'_>) {
        match component {
            "driver" => forward!("frame_nudger::driver", level, component, message),
            "watchdog" => forward!("frame_nudger::watchdog", level, component, message),
            "supervisor" => forward!("frame_nudger::supervisor", level, component, message),
            _ => forward!("frame_nudger", level, component, message),
        }
    }
}

/// A captured log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub component: &'static str,
    pub message: String,
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured records
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records at exactly `level`
    pub fn at_level(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }

    /// Number of records whose message contains `needle`
    pub fn count_containing(&self, needle: &str) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.message.contains(needle))
            .count()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn record(&self, level: LogLevel, component: &'static str, message: fmt::Arguments<'_>) {
        self.records.lock().push(LogRecord {
            level,
            component,
            message: message.to_string(),
        });
    }
}

/// Component-scoped handle onto a shared sink
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    component: &'static str,
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>, component: &'static str) -> Self {
        Self { sink, component }
    }

    /// Logger that forwards to `tracing`
    pub fn tracing(component: &'static str) -> Self {
        Self::new(Arc::new(TracingSink), component)
    }

    /// Same sink, different component name
    pub fn scoped(&self, component: &'static str) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            component,
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn debug(&self, message: fmt::Arguments<'_>) {
        self.sink.record(LogLevel::Debug, self.component, message);
    }

    pub fn info(&self, message: fmt::Arguments<'_>) {
        self.sink.record(LogLevel::Info, self.component, message);
    }

    pub fn warn(&self, message: fmt::Arguments<'_>) {
        self.sink.record(LogLevel::Warn, self.component, message);
    }

    pub fn error(&self, message: fmt::Arguments<'_>) {
        self.sink.record(LogLevel::Error, self.component, message);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}
