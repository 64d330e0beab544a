//! frame-nudger - keeps the display compositor active
//!
//! This crate drives a periodic refresh tick and supervises it:
//! - Tick driver with bounded start retries and display retargeting
//! - Health watchdog with throttled automatic restarts
//! - Supervisor owning both on a single serialized event queue
//! - OS integration seams for tick sources and display enumeration
//! - JSON configuration and structured logging

pub mod config;
pub mod core;
pub mod driver;
pub mod logging;
pub mod os;
pub mod supervisor;
pub mod watchdog;

// Re-export commonly used items
pub use config::{ConfigStore, ConfigStoreConfig, NudgerConfig};
pub use core::error::{NudgerError, Result, TickSourceError};
pub use core::event::{Event, SuspendReason};
pub use driver::{DriverState, RestartBackoff, TickDriver};
pub use os::{DisplayDirectory, DisplayId, DisplayMetadata, TickSink, TickSource};
pub use supervisor::{Supervisor, SupervisorHandle, SupervisorStatus};
pub use watchdog::{Evaluation, HealthWatchdog, RestartPolicy, WatchdogConfig};
