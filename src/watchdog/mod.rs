//! Watchdog Module
//!
//! Supervises the tick signal: a periodic health check compares the time of
//! the last observed tick to a stale threshold, and requests bounded,
//! throttled restarts from the owner when ticks stop arriving.

pub mod health;
pub mod policy;

#[cfg(test)]
mod tests;

pub use health::{HealthWatchdog, WatchdogConfig, HEALTH_CHECK_INTERVAL_MS, STALE_THRESHOLD_MS};
pub use policy::{Evaluation, RestartPolicy};
