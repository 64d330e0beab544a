//! Configuration Storage Implementation
//!
//! Provides JSON file-based configuration storage with:
//! - Atomic writes using temp file + rename
//! - Thread-safe access via RwLock
//! - Default configuration generation
//! - Validation of liveness tuning before it reaches the driver

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::driver::{DriverConfig, RestartBackoff, DEFAULT_RETRY_SCHEDULE_MS};
use crate::logging::LoggingConfig;
use crate::os::stub::DEFAULT_TICK_INTERVAL_MS;
use crate::os::{DisplayId, DisplayMetadata};
use crate::watchdog::WatchdogConfig;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration store settings
#[derive(Debug, Clone)]
pub struct ConfigStoreConfig {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Whether to create default config if not exists
    pub create_default: bool,
}

impl Default for ConfigStoreConfig {
    fn default() -> Self {
        let app_data = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("frame-nudger");

        Self {
            config_path: app_data.join("config.json"),
            create_default: true,
        }
    }
}

impl ConfigStoreConfig {
    pub fn at(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            create_default: true,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NudgerConfig {
    /// Configuration version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Health watchdog tuning
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Tick driver tuning
    #[serde(default)]
    pub driver: DriverSettings,

    /// Tick source and display settings
    #[serde(default)]
    pub source: SourceSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for NudgerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            watchdog: WatchdogConfig::default(),
            driver: DriverSettings::default(),
            source: SourceSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Tick driver tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSettings {
    /// Delays between start retries, in milliseconds
    #[serde(default = "default_retry_schedule_ms")]
    pub retry_schedule_ms: Vec<u64>,

    /// Tick rate sampling window in milliseconds
    #[serde(default = "default_sample_window_ms")]
    pub sample_window_ms: u64,
}

fn default_retry_schedule_ms() -> Vec<u64> {
    DEFAULT_RETRY_SCHEDULE_MS.to_vec()
}

fn default_sample_window_ms() -> u64 {
    5000
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            retry_schedule_ms: default_retry_schedule_ms(),
            sample_window_ms: default_sample_window_ms(),
        }
    }
}

impl DriverSettings {
    pub fn to_driver_config(&self) -> DriverConfig {
        DriverConfig {
            backoff: RestartBackoff::from_millis(&self.retry_schedule_ms),
            sample_window: Duration::from_millis(self.sample_window_ms),
        }
    }
}

/// Tick source and display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Software tick period in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Displays to expose; empty means a single built-in display
    #[serde(default)]
    pub displays: Vec<DisplayMetadata>,

    /// Display to bind to when it is connected
    #[serde(default)]
    pub preferred_display: Option<DisplayId>,

    /// Number of initial start attempts that fail, for exercising recovery
    #[serde(default)]
    pub simulated_start_failures: u32,
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            displays: Vec::new(),
            preferred_display: None,
            simulated_start_failures: 0,
        }
    }
}

impl SourceSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl NudgerConfig {
    /// Reject tuning the driver and watchdog cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        let w = &self.watchdog;
        if w.check_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "watchdog.check_interval_ms must be positive".to_string(),
            ));
        }
        if w.stale_threshold_ms == 0 {
            return Err(ConfigError::Invalid(
                "watchdog.stale_threshold_ms must be positive".to_string(),
            ));
        }
        if w.max_restarts_per_window == 0 {
            return Err(ConfigError::Invalid(
                "watchdog.max_restarts_per_window must be at least 1".to_string(),
            ));
        }
        if self.driver.retry_schedule_ms.is_empty() {
            return Err(ConfigError::Invalid(
                "driver.retry_schedule_ms must not be empty".to_string(),
            ));
        }
        if self.driver.sample_window_ms == 0 {
            return Err(ConfigError::Invalid(
                "driver.sample_window_ms must be positive".to_string(),
            ));
        }
        if self.source.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "source.tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.source.tick_interval_ms >= w.stale_threshold_ms {
            return Err(ConfigError::Invalid(format!(
                "source.tick_interval_ms ({}) must be shorter than watchdog.stale_threshold_ms ({})",
                self.source.tick_interval_ms, w.stale_threshold_ms
            )));
        }
        Ok(())
    }
}

/// Configuration store
pub struct ConfigStore {
    config: Arc<RwLock<NudgerConfig>>,
    settings: ConfigStoreConfig,
}

impl ConfigStore {
    /// Load the configuration, writing defaults when the file is missing
    pub async fn new(settings: ConfigStoreConfig) -> ConfigResult<Self> {
        if let Some(parent) = settings.config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let config = if settings.config_path.exists() {
            Self::load_from_file(&settings.config_path).await?
        } else if settings.create_default {
            let default_config = NudgerConfig::default();
            Self::save_to_file(&settings.config_path, &default_config).await?;
            default_config
        } else {
            return Err(ConfigError::NotFound(settings.config_path.clone()));
        };

        config.validate()?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            settings,
        })
    }

    /// Load configuration from file
    async fn load_from_file(path: &Path) -> ConfigResult<NudgerConfig> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: NudgerConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file with atomic write
    async fn save_to_file(path: &Path, config: &NudgerConfig) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(config)?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, path).await?;

        Ok(())
    }

    /// Get current configuration (read-only)
    pub async fn get(&self) -> NudgerConfig {
        self.config.read().await.clone()
    }

    /// Update configuration. The change is validated before it is stored.
    pub async fn update<F>(&self, updater: F) -> ConfigResult<NudgerConfig>
    where
        F: FnOnce(&mut NudgerConfig),
    {
        let mut config = self.config.write().await;

        let mut candidate = config.clone();
        updater(&mut candidate);
        candidate.validate()?;

        Self::save_to_file(&self.settings.config_path, &candidate).await?;
        *config = candidate;

        Ok(config.clone())
    }

    /// Re-read the file from disk
    pub async fn reload(&self) -> ConfigResult<NudgerConfig> {
        let loaded = Self::load_from_file(&self.settings.config_path).await?;
        loaded.validate()?;
        let mut config = self.config.write().await;
        *config = loaded;
        Ok(config.clone())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.settings.config_path
    }
}
