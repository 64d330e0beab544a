//! Error types for frame-nudger
//!
//! Lifecycle operations on the driver and watchdog never fail from the
//! owner's point of view; these types cover the collaborator boundaries
//! (tick source, configuration, logging) whose failures are either absorbed
//! into retry/throttle behavior or surfaced at startup.

use thiserror::Error;

use crate::config::ConfigError;
use crate::os::DisplayId;
use crate::logging::LoggingError;

/// Result type alias for frame-nudger operations
pub type Result<T> = std::result::Result<T, NudgerError>;

/// Main error type for frame-nudger
#[derive(Error, Debug)]
pub enum NudgerError {
    #[error("Tick source error: {0}")]
    TickSource(#[from] TickSourceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures reported by an underlying periodic tick source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TickSourceError {
    #[error("Tick source failed to start: {reason}")]
    CreateFailed { reason: String },

    #[error("Failed to bind tick source to display {display}: {reason}")]
    SetTargetFailed { display: DisplayId, reason: String },

    #[error("Tick source is not running")]
    NotRunning,
}

impl TickSourceError {
    /// Convenience constructor for start failures
    pub fn create_failed(reason: impl Into<String>) -> Self {
        TickSourceError::CreateFailed {
            reason: reason.into(),
        }
    }
}
