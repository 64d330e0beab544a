//! Tick driver
//!
//! Owns the lifecycle of the periodic signal: start, stop, restart, retry
//! with backoff when the tick source fails to start, retargeting after each
//! successful start, and tick rate sampling.
//!
//! The driver never blocks and never returns errors to its owner. Failures
//! become retries, warnings, or a terminal "exhausted" state that the owner
//! can observe.

pub mod backoff;
pub mod sampler;


pub use backoff::{RestartBackoff, DEFAULT_RETRY_SCHEDULE_MS};
pub use sampler::{TickRateSampler, SAMPLE_WINDOW};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::core::clock::SharedClock;
use crate::core::error::TickSourceError;
use crate::core::event::{Event, EventSender, ScheduledEvent};
use crate::logging::Logger;
use crate::os::{select_target, DisplayDirectory, DisplayId, TickSink, TickSource};

/// Driver lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    /// Source inactive, nothing pending
    Idle,
    /// Source initialization in progress
    Starting,
    /// Source active and ticking
    Running,
    /// A start failed; another attempt is scheduled
    RetryScheduled,
}

/// Callback invoked on every accepted tick
pub type TickHandler = Box<dyn FnMut(Instant) + Send>;

/// Driver tuning
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub backoff: RestartBackoff,
    pub sample_window: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            backoff: RestartBackoff::default(),
            sample_window: SAMPLE_WINDOW,
        }
    }
}

struct PendingRetry {
    generation: u64,
    _timer: ScheduledEvent,
}

/// Lifecycle owner of the underlying tick source
pub struct TickDriver {
    source: Box<dyn TickSource>,
    displays: Arc<dyn DisplayDirectory>,
    backoff: RestartBackoff,
    sampler: TickRateSampler,
    state: DriverState,
    retry_count: u32,
    exhausted: bool,
    /// Bumped on every start attempt; ticks from older cycles are dropped
    cycle: u64,
    retry_generation: u64,
    pending_retry: Option<PendingRetry>,
    target: Option<DisplayId>,
    on_tick: Option<TickHandler>,
    events: EventSender,
    clock: SharedClock,
    log: Logger,
}

impl TickDriver {
    pub fn new(
        source: Box<dyn TickSource>,
        displays: Arc<dyn DisplayDirectory>,
        config: DriverConfig,
        events: EventSender,
        clock: SharedClock,
        log: Logger,
    ) -> Self {
        let now = clock.now();
        Self {
            source,
            displays,
            backoff: config.backoff,
            sampler: TickRateSampler::new(config.sample_window, now),
            state: DriverState::Idle,
            retry_count: 0,
            exhausted: false,
            cycle: 0,
            retry_generation: 0,
            pending_retry: None,
            target: None,
            on_tick: None,
            events,
            clock,
            log,
        }
    }

    /// Register the owner's per-tick callback
    pub fn with_tick_handler(mut self, handler: TickHandler) -> Self {
        self.on_tick = Some(handler);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == DriverState::Running
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// True once a start sequence has used up the backoff schedule
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn has_pending_retry(&self) -> bool {
        self.pending_retry.is_some()
    }

    /// Display the source was last bound to
    pub fn target(&self) -> Option<DisplayId> {
        self.target
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Rate from the most recent closed sampling window
    pub fn tick_rate(&self) -> Option<f64> {
        self.sampler.last_rate()
    }

    /// Start the source. Returns whether it is running afterwards.
    ///
    /// No-op when already running. On failure the source's visible side
    /// effect is concealed and a retry is scheduled per the backoff.
    pub fn start(&mut self) -> bool {
        if self.state == DriverState::Running {
            return true;
        }

        // An explicit start supersedes any retry still waiting
        self.cancel_retry();

        self.state = DriverState::Starting;
        self.cycle += 1;
        let sink = TickSink::new(self.events.clone(), self.cycle);

        match self.source.create_and_start(sink) {
            Ok(()) => {
                self.state = DriverState::Running;
                self.retry_count = 0;
                self.exhausted = false;
                self.sampler.reset(self.clock.now());
                self.log
                    .info(format_args!("Tick source started (cycle {})", self.cycle));
                self.retarget();
                true
            }
            Err(e) => {
                self.source.conceal();
                self.schedule_retry(&e);
                false
            }
        }
    }

    /// Stop the source and cancel any pending retry. Safe when already idle.
    pub fn stop(&mut self, reason: &str) {
        let had_retry = self.cancel_retry();
        let was_running = self.state == DriverState::Running;

        if !was_running && !had_retry && self.state == DriverState::Idle {
            return;
        }

        if was_running {
            self.source.stop();
        }
        self.state = DriverState::Idle;

        self.log.info(format_args!("Tick source stopped: {}", reason));
    }

    /// Stop, then start
    pub fn restart(&mut self, reason: &str) -> bool {
        self.log.info(format_args!("Restarting tick source: {}", reason));
        self.stop(reason);
        self.start()
    }

    /// React to a display reconfiguration
    pub fn handle_topology_change(&mut self) -> bool {
        self.log.info(format_args!(
            "Display configuration changed ({} displays)",
            self.displays.displays().len()
        ));
        if self.is_running() {
            self.restart("display configuration changed")
        } else {
            self.start()
        }
    }

    /// Forget consecutive failures so the next start sequence gets the full
    /// backoff schedule again
    pub fn reset_retries(&mut self) {
        self.retry_count = 0;
        self.exhausted = false;
    }

    /// Handle a tick posted by the source. Returns false for ticks that
    /// belong to an older cycle or arrive while not running.
    pub fn handle_tick(&mut self, cycle: u64, at: Instant) -> bool {
        if self.state != DriverState::Running || cycle != self.cycle {
            return false;
        }

        if let Some(handler) = self.on_tick.as_mut() {
            handler(at);
        }

        if let Some(rate) = self.sampler.record(at) {
            self.log
                .debug(format_args!("Estimated tick rate: {:.1} Hz", rate));
        }
        true
    }

    /// Handle an elapsed backoff delay. Only the most recently scheduled
    /// retry may fire.
    pub fn handle_retry(&mut self, generation: u64) -> bool {
        match &self.pending_retry {
            Some(pending) if pending.generation == generation => {}
            _ => return false,
        }
        self.pending_retry = None;
        self.log.info(format_args!(
            "Retrying tick source start (attempt {}/{})",
            self.retry_count,
            self.backoff.max_attempts()
        ));
        self.start();
        true
    }

    fn schedule_retry(&mut self, error: &TickSourceError) {
        match self.backoff.delay_for(self.retry_count) {
            Some(delay) => {
                self.retry_count += 1;
                self.retry_generation += 1;
                let generation = self.retry_generation;
                let timer = ScheduledEvent::after(
                    delay,
                    self.events.clone(),
                    Event::RetryDue { generation },
                );
                self.pending_retry = Some(PendingRetry {
                    generation,
                    _timer: timer,
                });
                self.state = DriverState::RetryScheduled;
                self.log.warn(format_args!(
                    "{}; retrying in {:?} (attempt {}/{})",
                    error,
                    delay,
                    self.retry_count,
                    self.backoff.max_attempts()
                ));
            }
            None => {
                self.state = DriverState::Idle;
                self.exhausted = true;
                self.log.error(format_args!(
                    "{}; giving up after {} retries",
                    error, self.retry_count
                ));
            }
        }
    }

    /// Returns whether a retry was pending
    fn cancel_retry(&mut self) -> bool {
        match self.pending_retry.take() {
            Some(_pending) => {
                if self.state == DriverState::RetryScheduled {
                    self.state = DriverState::Idle;
                }
                true
            }
            None => false,
        }
    }

    fn retarget(&mut self) {
        let display = select_target(self.displays.as_ref());
        match self.source.set_target(display) {
            Ok(()) => {
                self.target = Some(display);
                match self.displays.metadata_for(display) {
                    Some(meta) => self.log.info(format_args!(
                        "Bound to display {} ({}, {})",
                        display,
                        meta.name,
                        meta.refresh_hz
                            .map(|hz| format!("{:.0} Hz", hz))
                            .unwrap_or_else(|| "unknown refresh rate".to_string())
                    )),
                    None => self.log.info(format_args!("Bound to display {}", display)),
                }
            }
            Err(e) => {
                self.log.warn(format_args!(
                    "{}; continuing on previous target",
                    e
                ));
            }
        }
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.pending_retry = None;
        if self.state == DriverState::Running {
            self.source.stop();
        }
    }
}

impl std::fmt::Debug for TickDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickDriver")
            .field("state", &self.state)
            .field("retry_count", &self.retry_count)
            .field("cycle", &self.cycle)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
