//! Restart backoff schedule
//!
//! A fixed, ordered list of delays consulted by the driver's consecutive
//! failure count. Holds no state of its own.

use std::time::Duration;

/// Delays used when none are configured: 0.5s, 1s, 2s
pub const DEFAULT_RETRY_SCHEDULE_MS: [u64; 3] = [500, 1000, 2000];

/// Fixed retry schedule for tick source start failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartBackoff {
    schedule: Vec<Duration>,
}

impl RestartBackoff {
    pub fn new(schedule: Vec<Duration>) -> Self {
        Self { schedule }
    }

    pub fn from_millis(schedule: &[u64]) -> Self {
        Self::new(schedule.iter().copied().map(Duration::from_millis).collect())
    }

    /// Delay before the next attempt, or `None` once `retry_count` has run
    /// past the end of the schedule.
    pub fn delay_for(&self, retry_count: u32) -> Option<Duration> {
        self.schedule.get(retry_count as usize).copied()
    }

    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count as usize >= self.schedule.len()
    }

    /// Number of retries the schedule allows
    pub fn max_attempts(&self) -> u32 {
        self.schedule.len() as u32
    }
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self::from_millis(&DEFAULT_RETRY_SCHEDULE_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_schedule() {
        let backoff = RestartBackoff::default();
        assert_eq!(backoff.delay_for(0), Some(Duration::from_millis(500)));
        assert_eq!(backoff.delay_for(1), Some(Duration::from_secs(1)));
        assert_eq!(backoff.delay_for(2), Some(Duration::from_secs(2)));
        assert_eq!(backoff.delay_for(3), None);
        assert!(backoff.is_exhausted(3));
        assert!(!backoff.is_exhausted(2));
        assert_eq!(backoff.max_attempts(), 3);
    }

    #[test]
    fn test_empty_schedule_is_always_exhausted() {
        let backoff = RestartBackoff::new(Vec::new());
        assert_eq!(backoff.delay_for(0), None);
        assert!(backoff.is_exhausted(0));
    }

    proptest! {
        /// Index past the schedule is exhausted, anything inside returns the entry
        #[test]
        fn delay_matches_schedule(
            schedule in prop::collection::vec(1u64..10_000, 0..8),
            retry_count in 0u32..16,
        ) {
            let backoff = RestartBackoff::from_millis(&schedule);
            match schedule.get(retry_count as usize) {
                Some(ms) => {
                    prop_assert_eq!(backoff.delay_for(retry_count), Some(Duration::from_millis(*ms)));
                    prop_assert!(!backoff.is_exhausted(retry_count));
                }
                None => {
                    prop_assert_eq!(backoff.delay_for(retry_count), None);
                    prop_assert!(backoff.is_exhausted(retry_count));
                }
            }
        }
    }
}
