//! Tick rate estimation over fixed sampling windows

use std::time::Duration;

use tokio::time::Instant;

/// Length of one sampling window
pub const SAMPLE_WINDOW: Duration = Duration::from_secs(5);

/// Counts ticks and reports `count / elapsed` each time a window closes
#[derive(Debug, Clone)]
pub struct TickRateSampler {
    window: Duration,
    started_at: Instant,
    count: u64,
    last_rate: Option<f64>,
}

impl TickRateSampler {
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            window,
            started_at: now,
            count: 0,
            last_rate: None,
        }
    }

    /// Restart the window at `now` with a zero count
    pub fn reset(&mut self, now: Instant) {
        self.started_at = now;
        self.count = 0;
    }

    /// Count one tick. Returns the estimated rate in Hz when this tick closes
    /// the window.
    pub fn record(&mut self, at: Instant) -> Option<f64> {
        self.count += 1;
        let elapsed = at.saturating_duration_since(self.started_at);
        if elapsed < self.window {
            return None;
        }

        let rate = self.count as f64 / elapsed.as_secs_f64();
        self.last_rate = Some(rate);
        self.reset(at);
        Some(rate)
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Rate reported by the most recently closed window
    pub fn last_rate(&self) -> Option<f64> {
        self.last_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_rate_when_window_closes() {
        let t0 = Instant::now();
        let mut sampler = TickRateSampler::new(SAMPLE_WINDOW, t0);

        // 60 Hz for five seconds: 299 ticks stay inside the window
        let period = Duration::from_secs(1) / 60;
        for i in 1..300u32 {
            assert_eq!(sampler.record(t0 + period * i), None);
        }
        let rate = sampler.record(t0 + Duration::from_secs(5)).unwrap();
        assert!((rate - 60.0).abs() < 0.01, "rate was {rate}");

        assert_eq!(sampler.count(), 0);
        assert_eq!(sampler.started_at(), t0 + Duration::from_secs(5));
        assert_eq!(sampler.last_rate(), Some(rate));
    }

    #[test]
    fn test_reset_clears_count() {
        let t0 = Instant::now();
        let mut sampler = TickRateSampler::new(SAMPLE_WINDOW, t0);
        sampler.record(t0 + Duration::from_secs(1));
        sampler.record(t0 + Duration::from_secs(2));
        assert_eq!(sampler.count(), 2);

        let t1 = t0 + Duration::from_secs(3);
        sampler.reset(t1);
        assert_eq!(sampler.count(), 0);
        assert_eq!(sampler.started_at(), t1);
        assert_eq!(sampler.record(t1 + Duration::from_secs(4)), None);
    }
}
