//! Throttled restart policy
//!
//! Pure evaluation over explicit timestamps: no clock, no timers, no I/O.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Outcome of one health evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    /// A tick was seen within the stale threshold
    Healthy,
    /// Ticks are stale and the restart budget allows another restart
    StaleNeedsRestart,
    /// Ticks are stale but the restart budget for the window is spent
    StaleThrottled,
}

/// Sliding-window restart budget
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    stale_threshold: Duration,
    restart_window: Duration,
    max_restarts_per_window: usize,
    restarts: VecDeque<Instant>,
}

impl RestartPolicy {
    pub fn new(
        stale_threshold: Duration,
        restart_window: Duration,
        max_restarts_per_window: usize,
    ) -> Self {
        Self {
            stale_threshold,
            restart_window,
            max_restarts_per_window,
            restarts: VecDeque::with_capacity(max_restarts_per_window),
        }
    }

    /// Judge tick freshness at `now`.
    ///
    /// Restarts older than the window are pruned first, so an expired entry
    /// frees its slot before capacity is checked. Only `StaleNeedsRestart`
    /// records a restart.
    pub fn evaluate(&mut self, now: Instant, last_tick_at: Instant) -> Evaluation {
        self.prune(now);

        if now.saturating_duration_since(last_tick_at) <= self.stale_threshold {
            return Evaluation::Healthy;
        }

        if self.restarts.len() >= self.max_restarts_per_window {
            return Evaluation::StaleThrottled;
        }

        self.restarts.push_back(now);
        Evaluation::StaleNeedsRestart
    }

    /// Forget every recorded restart
    pub fn reset(&mut self) {
        self.restarts.clear();
    }

    /// Restarts currently counted against the window
    pub fn restarts_in_window(&self) -> usize {
        self.restarts.len()
    }

    pub fn restart_timestamps(&self) -> impl Iterator<Item = &Instant> {
        self.restarts.iter()
    }

    pub fn stale_threshold(&self) -> Duration {
        self.stale_threshold
    }

    pub fn restart_window(&self) -> Duration {
        self.restart_window
    }

    pub fn max_restarts_per_window(&self) -> usize {
        self.max_restarts_per_window
    }

    fn prune(&mut self, now: Instant) {
        let window = self.restart_window;
        self.restarts
            .retain(|at| now.saturating_duration_since(*at) <= window);
    }
}
