//! Health watchdog
//!
//! Polls on its own fixed schedule while the owner considers the driver
//! active, judges tick freshness with [`RestartPolicy`], and asks the owner
//! for restarts by posting [`Event::RestartRequested`]. It never touches the
//! driver itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::policy::{Evaluation, RestartPolicy};
use crate::core::clock::SharedClock;
use crate::core::event::{Event, EventSender, ScheduledEvent};
use crate::logging::Logger;

/// Default poll interval in milliseconds
pub const HEALTH_CHECK_INTERVAL_MS: u64 = 2000;

/// Default stale threshold in milliseconds
pub const STALE_THRESHOLD_MS: u64 = 3000;

/// Watchdog configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Poll interval in milliseconds
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// How long without a tick before the signal counts as stale
    #[serde(default = "default_stale_threshold_ms")]
    pub stale_threshold_ms: u64,

    /// Sliding window for counting restarts, in milliseconds
    #[serde(default = "default_restart_window_ms")]
    pub restart_window_ms: u64,

    /// Restarts allowed inside one window before throttling
    #[serde(default = "default_max_restarts_per_window")]
    pub max_restarts_per_window: u32,
}

fn default_check_interval_ms() -> u64 {
    HEALTH_CHECK_INTERVAL_MS
}

fn default_stale_threshold_ms() -> u64 {
    STALE_THRESHOLD_MS
}

fn default_restart_window_ms() -> u64 {
    60_000
}

fn default_max_restarts_per_window() -> u32 {
    3
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            stale_threshold_ms: default_stale_threshold_ms(),
            restart_window_ms: default_restart_window_ms(),
            max_restarts_per_window: default_max_restarts_per_window(),
        }
    }
}

impl WatchdogConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn policy(&self) -> RestartPolicy {
        RestartPolicy::new(
            Duration::from_millis(self.stale_threshold_ms),
            Duration::from_millis(self.restart_window_ms),
            self.max_restarts_per_window as usize,
        )
    }
}

/// Tick freshness supervisor
pub struct HealthWatchdog {
    policy: RestartPolicy,
    check_interval: Duration,
    last_tick_at: Instant,
    nudger_running: bool,
    has_logged_throttle: bool,
    poll_timer: Option<ScheduledEvent>,
    events: EventSender,
    clock: SharedClock,
    log: Logger,
}

impl HealthWatchdog {
    pub fn new(config: &WatchdogConfig, events: EventSender, clock: SharedClock, log: Logger) -> Self {
        let now = clock.now();
        Self {
            policy: config.policy(),
            check_interval: config.check_interval(),
            last_tick_at: now,
            nudger_running: false,
            has_logged_throttle: false,
            poll_timer: None,
            events,
            clock,
            log,
        }
    }

    /// Begin posting [`Event::HealthPoll`] every check interval. Idempotent.
    pub fn start(&mut self) {
        if self.poll_timer.is_some() {
            return;
        }
        self.poll_timer = Some(ScheduledEvent::every(
            self.check_interval,
            self.events.clone(),
            Event::HealthPoll,
        ));
        self.log.debug(format_args!(
            "Health checks every {:?}, stale after {:?}",
            self.check_interval,
            self.policy.stale_threshold()
        ));
    }

    /// Cancel the poll timer
    pub fn stop(&mut self) {
        if self.poll_timer.take().is_some() {
            self.log.debug(format_args!("Health checks stopped"));
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poll_timer.is_some()
    }

    /// Tell the watchdog whether the owner considers the driver active.
    ///
    /// Arming stamps a fresh tick and clears restart history and the
    /// throttle flag. Disarming suspends evaluation.
    pub fn set_nudger_running(&mut self, running: bool) {
        self.nudger_running = running;
        if running {
            self.last_tick_at = self.clock.now();
            self.reset();
        }
    }

    /// Resume evaluation once a requested restart has finally started,
    /// possibly after start retries. Restart history and the throttle flag
    /// carry over.
    pub fn resume_after_restart(&mut self) {
        self.nudger_running = true;
        self.last_tick_at = self.clock.now();
    }

    /// Note a tick (or an explicit restart) at `at`, defaulting to now
    pub fn record_tick(&mut self, at: Option<Instant>) {
        self.last_tick_at = at.unwrap_or_else(|| self.clock.now());
        self.has_logged_throttle = false;
    }

    /// Clear restart history and the throttle flag
    pub fn reset(&mut self) {
        self.policy.reset();
        self.has_logged_throttle = false;
    }

    /// Run one evaluation at the current time and apply its side effects.
    /// Returns `None` while the driver is not considered active.
    pub fn poll(&mut self) -> Option<Evaluation> {
        if !self.nudger_running {
            return None;
        }

        let now = self.clock.now();
        let evaluation = self.policy.evaluate(now, self.last_tick_at);

        match evaluation {
            Evaluation::Healthy => {
                self.has_logged_throttle = false;
            }
            Evaluation::StaleNeedsRestart => {
                self.has_logged_throttle = false;
                self.log.warn(format_args!(
                    "No tick for {:?}; requesting restart ({}/{} in window)",
                    now.saturating_duration_since(self.last_tick_at),
                    self.policy.restarts_in_window(),
                    self.policy.max_restarts_per_window()
                ));
                self.events.emit(Event::RestartRequested);
            }
            Evaluation::StaleThrottled => {
                if !self.has_logged_throttle {
                    self.has_logged_throttle = true;
                    self.log.warn(format_args!(
                        "No tick for {:?}; {} restarts in the last {:?}, not restarting again",
                        now.saturating_duration_since(self.last_tick_at),
                        self.policy.restarts_in_window(),
                        self.policy.restart_window()
                    ));
                    self.events.emit(Event::RestartThrottled {
                        restarts: self.policy.restarts_in_window(),
                    });
                }
            }
        }

        Some(evaluation)
    }

    pub fn last_tick_at(&self) -> Instant {
        self.last_tick_at
    }

    pub fn is_nudger_running(&self) -> bool {
        self.nudger_running
    }

    pub fn has_logged_throttle(&self) -> bool {
        self.has_logged_throttle
    }

    pub fn restarts_in_window(&self) -> usize {
        self.policy.restarts_in_window()
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }
}

impl std::fmt::Debug for HealthWatchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthWatchdog")
            .field("nudger_running", &self.nudger_running)
            .field("restarts_in_window", &self.policy.restarts_in_window())
            .field("has_logged_throttle", &self.has_logged_throttle)
            .field("polling", &self.poll_timer.is_some())
            .finish_non_exhaustive()
    }
}
