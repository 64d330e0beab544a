//! Configuration management for frame-nudger
//!
//! Provides persistent configuration storage with:
//! - JSON file-based storage
//! - Validation of watchdog, driver and source tuning
//! - Thread-safe access

mod storage;

pub use storage::{
    ConfigError, ConfigResult, ConfigStore, ConfigStoreConfig, DriverSettings, NudgerConfig,
    SourceSettings,
};
