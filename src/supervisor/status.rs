//! Status snapshot published to observers (menu, CLI)

use serde::Serialize;

use crate::driver::DriverState;
use crate::os::DisplayId;

/// Point-in-time view of the liveness subsystem
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupervisorStatus {
    pub driver_state: DriverState,
    pub retry_count: u32,
    /// Start sequence ran out of retries
    pub start_exhausted: bool,
    /// Most recent sampled tick rate
    pub tick_rate_hz: Option<f64>,
    pub restarts_in_window: usize,
    /// Watchdog wanted a restart but the budget was spent
    pub throttled: bool,
    /// Paused from the menu
    pub paused: bool,
    /// System is asleep
    pub sleeping: bool,
    pub target: Option<DisplayId>,
    pub ticks_observed: u64,
}

impl Default for SupervisorStatus {
    fn default() -> Self {
        Self {
            driver_state: DriverState::Idle,
            retry_count: 0,
            start_exhausted: false,
            tick_rate_hz: None,
            restarts_in_window: 0,
            throttled: false,
            paused: false,
            sleeping: false,
            target: None,
            ticks_observed: 0,
        }
    }
}

impl SupervisorStatus {
    /// One-line summary for a status item or log line
    pub fn summary(&self) -> String {
        if self.paused {
            return "Paused".to_string();
        }
        if self.sleeping {
            return "Sleeping".to_string();
        }
        match self.driver_state {
            DriverState::Running if self.throttled => {
                "Running (stalled, restarts throttled)".to_string()
            }
            DriverState::Running => match self.tick_rate_hz {
                Some(hz) => format!("Running at {:.0} Hz", hz),
                None => "Running".to_string(),
            },
            DriverState::Starting => "Starting".to_string(),
            DriverState::RetryScheduled => format!("Retrying start (attempt {})", self.retry_count),
            DriverState::Idle if self.start_exhausted => "Failed to start".to_string(),
            DriverState::Idle => "Stopped".to_string(),
        }
    }
}
