//! Property-based tests for the watchdog module
//!
//! These tests verify the correctness properties of tick supervision.

#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;
    use std::time::Duration;
    use tokio::time::Instant;

    use crate::watchdog::policy::{Evaluation, RestartPolicy};

    /// Healthy evaluations never touch restart history
    mod healthy_evaluations {
        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            /// For any tick age at or under the threshold, evaluate is Healthy
            /// and the recorded restarts are unchanged
            #[test]
            fn fresh_ticks_are_healthy_and_pure(
                threshold_ms in 1u64..10_000,
                age_fraction in 0.0f64..=1.0,
                prior_restarts in 0usize..5,
                window_ms in 1_000u64..120_000,
            ) {
                let t0 = Instant::now();
                let mut policy = RestartPolicy::new(
                    Duration::from_millis(threshold_ms),
                    Duration::from_millis(window_ms),
                    8,
                );

                // Seed history with stale evaluations at t0 + threshold + 1..
                let stale_at = t0 + Duration::from_millis(threshold_ms + 1);
                for _ in 0..prior_restarts {
                    prop_assert_eq!(policy.evaluate(stale_at, t0), Evaluation::StaleNeedsRestart);
                }
                let before: Vec<Instant> = policy.restart_timestamps().copied().collect();

                let age = Duration::from_millis((threshold_ms as f64 * age_fraction) as u64);
                let last_tick = stale_at;
                let now = last_tick + age;
                prop_assert_eq!(policy.evaluate(now, last_tick), Evaluation::Healthy);

                // Pruning may drop expired entries but never adds any
                let after: Vec<Instant> = policy.restart_timestamps().copied().collect();
                prop_assert!(after.len() <= before.len());
                prop_assert!(after.iter().all(|t| before.contains(t)));
                if age <= Duration::from_millis(window_ms) {
                    prop_assert_eq!(after, before);
                }
            }
        }
    }

    /// Restart history never exceeds the budget
    mod restart_budget {
        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            /// For any sequence of evaluation times, the number of restarts
            /// counted in the window stays within max_restarts_per_window, and
            /// StaleNeedsRestart is returned only when there was room
            #[test]
            fn history_never_exceeds_budget(
                max in 1usize..6,
                window_s in 1u64..60,
                steps in prop::collection::vec(0u64..20_000, 1..60),
                tick_every in prop::option::of(1usize..10),
            ) {
                let t0 = Instant::now();
                let mut policy = RestartPolicy::new(
                    Duration::from_secs(1),
                    Duration::from_secs(window_s),
                    max,
                );
                let mut now = t0;
                let mut last_tick = t0;

                for (i, step) in steps.iter().enumerate() {
                    now += Duration::from_millis(*step);
                    if tick_every.map(|n| i % n == 0).unwrap_or(false) {
                        last_tick = now;
                    }
                    let before = policy.restarts_in_window();
                    let result = policy.evaluate(now, last_tick);
                    let after = policy.restarts_in_window();

                    prop_assert!(after <= max);
                    match result {
                        Evaluation::StaleNeedsRestart => prop_assert!(after >= 1),
                        Evaluation::StaleThrottled => {
                            prop_assert_eq!(after, max);
                            prop_assert!(after <= before);
                        }
                        Evaluation::Healthy => prop_assert!(after <= before),
                    }
                }
            }

            /// Once a window's worth of time passes with no new restarts, the
            /// next stale evaluation is allowed again
            #[test]
            fn expired_window_always_frees_a_slot(
                max in 1usize..6,
                window_s in 1u64..60,
            ) {
                let t0 = Instant::now();
                let mut policy = RestartPolicy::new(
                    Duration::from_secs(1),
                    Duration::from_secs(window_s),
                    max,
                );
                let first = t0 + Duration::from_secs(2);
                for _ in 0..max {
                    prop_assert_eq!(policy.evaluate(first, t0), Evaluation::StaleNeedsRestart);
                }
                prop_assert_eq!(policy.evaluate(first, t0), Evaluation::StaleThrottled);

                let later = first + Duration::from_secs(window_s) + Duration::from_millis(1);
                prop_assert_eq!(policy.evaluate(later, t0), Evaluation::StaleNeedsRestart);
                prop_assert_eq!(policy.restarts_in_window(), 1);
            }
        }
    }
}

#[cfg(test)]
mod watchdog_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

    use crate::core::clock::{Clock, ManualClock};
    use crate::core::event::{channel, Event, EventSender};
    use crate::logging::{LogLevel, Logger, MemorySink};
    use crate::watchdog::{Evaluation, HealthWatchdog, WatchdogConfig};

    struct Harness {
        watchdog: HealthWatchdog,
        clock: ManualClock,
        sink: Arc<MemorySink>,
        _tx: UnboundedSender<Event>,
        rx: UnboundedReceiver<Event>,
    }

    fn harness(config: WatchdogConfig) -> Harness {
        let (tx, rx) = channel();
        let clock = ManualClock::default();
        let sink = Arc::new(MemorySink::new());
        let watchdog = HealthWatchdog::new(
            &config,
            EventSender::new(&tx),
            Arc::new(clock.clone()),
            Logger::new(sink.clone(), "watchdog"),
        );
        Harness {
            watchdog,
            clock,
            sink,
            _tx: tx,
            rx,
        }
    }

    fn tight_config() -> WatchdogConfig {
        WatchdogConfig {
            check_interval_ms: 2000,
            stale_threshold_ms: 1000,
            restart_window_ms: 30_000,
            max_restarts_per_window: 1,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_watchdog_config_default() {
        let config = WatchdogConfig::default();
        assert_eq!(config.check_interval(), Duration::from_secs(2));
        assert_eq!(config.stale_threshold_ms, 3000);
        assert_eq!(config.max_restarts_per_window, 3);
    }

    #[tokio::test]
    async fn test_no_evaluation_while_not_running() {
        let mut h = harness(tight_config());
        h.clock.advance(Duration::from_secs(60));
        assert_eq!(h.watchdog.poll(), None);
        assert!(drain(&mut h.rx).is_empty());
    }

    #[tokio::test]
    async fn test_stale_requests_restart_then_throttles_once() {
        let mut h = harness(tight_config());
        h.watchdog.set_nudger_running(true);

        h.clock.advance(Duration::from_secs(2));
        assert_eq!(h.watchdog.poll(), Some(Evaluation::StaleNeedsRestart));
        assert_eq!(drain(&mut h.rx), vec![Event::RestartRequested]);

        h.clock.advance(Duration::from_secs(1));
        assert_eq!(h.watchdog.poll(), Some(Evaluation::StaleThrottled));
        assert_eq!(
            drain(&mut h.rx),
            vec![Event::RestartThrottled { restarts: 1 }]
        );
        assert!(h.watchdog.has_logged_throttle());

        // Further throttled evaluations stay quiet
        for _ in 0..3 {
            h.clock.advance(Duration::from_secs(2));
            assert_eq!(h.watchdog.poll(), Some(Evaluation::StaleThrottled));
        }
        assert!(drain(&mut h.rx).is_empty());
        assert_eq!(h.sink.count_containing("not restarting again"), 1);
    }

    #[tokio::test]
    async fn test_every_stale_evaluation_requests_until_window_full() {
        let mut config = tight_config();
        config.max_restarts_per_window = 3;
        let mut h = harness(config);
        h.watchdog.set_nudger_running(true);

        for _ in 0..3 {
            h.clock.advance(Duration::from_secs(2));
            assert_eq!(h.watchdog.poll(), Some(Evaluation::StaleNeedsRestart));
        }
        assert_eq!(drain(&mut h.rx), vec![Event::RestartRequested; 3]);
        assert_eq!(h.watchdog.restarts_in_window(), 3);
    }

    #[tokio::test]
    async fn test_recorded_tick_clears_throttle_flag() {
        let mut h = harness(tight_config());
        h.watchdog.set_nudger_running(true);
        h.clock.advance(Duration::from_secs(2));
        h.watchdog.poll();
        h.clock.advance(Duration::from_secs(1));
        h.watchdog.poll();
        assert!(h.watchdog.has_logged_throttle());

        h.watchdog.record_tick(Some(h.clock.now()));
        assert!(!h.watchdog.has_logged_throttle());
        assert_eq!(h.watchdog.poll(), Some(Evaluation::Healthy));

        // A new throttled streak notifies again
        drain(&mut h.rx);
        h.clock.advance(Duration::from_secs(2));
        assert_eq!(h.watchdog.poll(), Some(Evaluation::StaleThrottled));
        assert_eq!(
            drain(&mut h.rx),
            vec![Event::RestartThrottled { restarts: 1 }]
        );
    }

    #[tokio::test]
    async fn test_record_tick_defaults_to_now() {
        let mut h = harness(tight_config());
        h.clock.advance(Duration::from_secs(7));
        h.watchdog.record_tick(None);
        assert_eq!(h.watchdog.last_tick_at(), h.clock.now());
    }

    #[tokio::test]
    async fn test_set_nudger_running_resets_history() {
        let mut h = harness(tight_config());
        h.watchdog.set_nudger_running(true);
        h.clock.advance(Duration::from_secs(2));
        h.watchdog.poll();
        h.clock.advance(Duration::from_secs(1));
        h.watchdog.poll();
        assert_eq!(h.watchdog.restarts_in_window(), 1);
        assert!(h.watchdog.has_logged_throttle());

        // Already running: arming again still resets
        h.watchdog.set_nudger_running(true);
        assert_eq!(h.watchdog.restarts_in_window(), 0);
        assert!(!h.watchdog.has_logged_throttle());
        assert_eq!(h.watchdog.last_tick_at(), h.clock.now());
        assert_eq!(h.watchdog.poll(), Some(Evaluation::Healthy));

        h.watchdog.set_nudger_running(false);
        h.clock.advance(Duration::from_secs(60));
        assert_eq!(h.watchdog.poll(), None);
    }

    #[tokio::test]
    async fn test_resume_after_restart_keeps_history() {
        let mut h = harness(tight_config());
        h.watchdog.set_nudger_running(true);
        h.clock.advance(Duration::from_secs(2));
        assert_eq!(h.watchdog.poll(), Some(Evaluation::StaleNeedsRestart));

        // Restart went through a failed start: disarmed, then re-armed
        h.watchdog.set_nudger_running(false);
        h.clock.advance(Duration::from_millis(500));
        h.watchdog.resume_after_restart();

        assert!(h.watchdog.is_nudger_running());
        assert_eq!(h.watchdog.restarts_in_window(), 1);
        assert_eq!(h.watchdog.last_tick_at(), h.clock.now());
        assert_eq!(h.watchdog.poll(), Some(Evaluation::Healthy));

        h.clock.advance(Duration::from_secs(2));
        assert_eq!(h.watchdog.poll(), Some(Evaluation::StaleThrottled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_posts_polls_and_stop_cancels() {
        let mut h = harness(tight_config());
        h.watchdog.start();
        h.watchdog.start();
        assert!(h.watchdog.is_polling());

        let first = tokio::time::timeout(Duration::from_secs(3), h.rx.recv()).await;
        assert_eq!(first.unwrap(), Some(Event::HealthPoll));

        h.watchdog.stop();
        assert!(!h.watchdog.is_polling());
        let waited = tokio::time::timeout(Duration::from_secs(10), h.rx.recv()).await;
        assert!(waited.is_err());
        assert_eq!(h.rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_stale_warning_logged() {
        let mut h = harness(tight_config());
        h.watchdog.set_nudger_running(true);
        h.clock.advance(Duration::from_secs(5));
        h.watchdog.poll();
        let warnings = h.sink.at_level(LogLevel::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("requesting restart"));
    }
}
