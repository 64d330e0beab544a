//! Supervisor
//!
//! The owner of the liveness subsystem and its single serialized context.
//! It drains one event queue and is the only place where the driver and the
//! watchdog meet: ticks observed by the driver are forwarded to the
//! watchdog, and restart requests from the watchdog are carried out on the
//! driver.
//!
//! Collaborators outside the core (display reconfiguration notifications,
//! sleep/wake notifications, the menu) talk to it through a
//! [`SupervisorHandle`] and observe it through a `watch` channel of
//! [`SupervisorStatus`].

mod status;


pub use status::SupervisorStatus;

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

use crate::config::NudgerConfig;
use crate::core::clock::SharedClock;
use crate::core::event::{channel, Event, EventSender, SuspendReason};
use crate::driver::TickDriver;
use crate::logging::Logger;
use crate::os::{DisplayDirectory, SoftwareTickSource, StaticDisplayDirectory, TickSource};
use crate::watchdog::HealthWatchdog;

/// Cloneable handle for posting events to a running supervisor
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: UnboundedSender<Event>,
}

impl SupervisorHandle {
    /// Post an event. Returns false once the supervisor is gone.
    pub fn send(&self, event: Event) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn topology_changed(&self) -> bool {
        self.send(Event::TopologyChanged)
    }

    pub fn will_sleep(&self) -> bool {
        self.send(Event::Suspend(SuspendReason::Sleep))
    }

    pub fn did_wake(&self) -> bool {
        self.send(Event::Resume(SuspendReason::Sleep))
    }

    pub fn pause(&self) -> bool {
        self.send(Event::Suspend(SuspendReason::User))
    }

    pub fn resume(&self) -> bool {
        self.send(Event::Resume(SuspendReason::User))
    }

    pub fn shutdown(&self) -> bool {
        self.send(Event::Shutdown)
    }
}

/// Owner of the tick driver and the health watchdog
pub struct Supervisor {
    driver: TickDriver,
    watchdog: HealthWatchdog,
    tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
    status: watch::Sender<SupervisorStatus>,
    paused: bool,
    sleeping: bool,
    throttled: bool,
    /// A watchdog restart is still working through start retries
    recovering: bool,
    ticks_observed: u64,
    log: Logger,
}

impl Supervisor {
    pub fn new(
        config: &NudgerConfig,
        source: Box<dyn TickSource>,
        displays: Arc<dyn DisplayDirectory>,
        clock: SharedClock,
        log: Logger,
    ) -> Self {
        let (tx, rx) = channel();
        let events = EventSender::new(&tx);

        let driver = TickDriver::new(
            source,
            displays,
            config.driver.to_driver_config(),
            events.clone(),
            Arc::clone(&clock),
            log.scoped("driver"),
        );
        let watchdog = HealthWatchdog::new(&config.watchdog, events, clock, log.scoped("watchdog"));
        let (status, _) = watch::channel(SupervisorStatus::default());

        Self {
            driver,
            watchdog,
            tx,
            rx,
            status,
            paused: false,
            sleeping: false,
            throttled: false,
            recovering: false,
            ticks_observed: 0,
            log: log.scoped("supervisor"),
        }
    }

    /// Build a supervisor over the portable software tick source, using the
    /// display list and tick period from `config.source`
    pub fn with_software_source(config: &NudgerConfig, clock: SharedClock, log: Logger) -> Self {
        let settings = &config.source;
        let displays = if settings.displays.is_empty() {
            StaticDisplayDirectory::single_display()
        } else {
            StaticDisplayDirectory::new(settings.displays.clone())
        };

        if let Some(preferred) = settings.preferred_display {
            if displays.ids().contains(&preferred) {
                displays.set_known_target(Some(preferred));
            } else {
                log.warn(format_args!(
                    "Preferred display {} is not connected; using the system default",
                    preferred
                ));
            }
        }

        let source = SoftwareTickSource::new(settings.tick_interval(), displays.ids())
            .with_start_failures(settings.simulated_start_failures);

        Self::new(config, Box::new(source), Arc::new(displays), clock, log)
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SupervisorStatus {
        self.status.borrow().clone()
    }

    pub fn driver(&self) -> &TickDriver {
        &self.driver
    }

    pub fn watchdog(&self) -> &HealthWatchdog {
        &self.watchdog
    }

    /// Start the driver and the watchdog's poll timer
    pub fn start(&mut self) {
        self.log.info(format_args!("Starting liveness supervision"));
        self.watchdog.start();
        if self.wants_driver() {
            self.driver.start();
        }
        self.sync_watchdog();
        self.publish();
    }

    /// Run until [`Event::Shutdown`]
    pub async fn run(mut self) {
        self.start();
        while let Some(event) = self.rx.recv().await {
            if self.dispatch(event).is_break() {
                break;
            }
        }
        self.log.info(format_args!("Liveness supervision stopped"));
    }

    /// Wait for the next event and handle it. Returns the handled event.
    pub async fn step(&mut self) -> Option<Event> {
        let event = self.rx.recv().await?;
        self.dispatch(event.clone());
        Some(event)
    }

    /// Handle one event on the serialized context
    pub fn dispatch(&mut self, event: Event) -> ControlFlow<()> {
        match event {
            Event::Tick { cycle, at } => {
                if self.driver.handle_tick(cycle, at) {
                    self.ticks_observed += 1;
                    self.throttled = false;
                    self.watchdog.record_tick(Some(at));
                }
            }
            Event::RetryDue { generation } => {
                self.driver.handle_retry(generation);
            }
            Event::HealthPoll => {
                self.watchdog.poll();
            }
            Event::RestartRequested => {
                if self.wants_driver() && self.watchdog.is_nudger_running() {
                    self.recovering = !self.driver.restart("ticks stale");
                    self.watchdog.record_tick(None);
                }
            }
            Event::RestartThrottled { restarts } => {
                self.throttled = true;
                self.log.error(format_args!(
                    "Tick signal stalled after {} automatic restarts; waiting for recovery",
                    restarts
                ));
            }
            Event::TopologyChanged => {
                if self.wants_driver() {
                    self.recovering = false;
                    if !self.driver.is_running() {
                        self.driver.reset_retries();
                    }
                    self.driver.handle_topology_change();
                    self.watchdog.record_tick(None);
                }
            }
            Event::Suspend(reason) => {
                match reason {
                    SuspendReason::Sleep => self.sleeping = true,
                    SuspendReason::User => self.paused = true,
                }
                self.recovering = false;
                self.driver.stop(suspend_reason(reason));
            }
            Event::Resume(reason) => {
                match reason {
                    SuspendReason::Sleep => self.sleeping = false,
                    SuspendReason::User => self.paused = false,
                }
                if self.wants_driver() {
                    self.driver.reset_retries();
                    self.driver.start();
                } else {
                    self.log.debug(format_args!(
                        "Not resuming after {:?}: paused={} sleeping={}",
                        reason, self.paused, self.sleeping
                    ));
                }
            }
            Event::Shutdown => {
                self.driver.stop("shutting down");
                self.watchdog.stop();
                self.watchdog.set_nudger_running(false);
                self.publish();
                return ControlFlow::Break(());
            }
        }

        self.sync_watchdog();
        self.publish();
        ControlFlow::Continue(())
    }

    fn wants_driver(&self) -> bool {
        !self.paused && !self.sleeping
    }

    /// Arm the watchdog exactly while the driver is running and wanted.
    ///
    /// A start that completes a watchdog restart re-arms without clearing
    /// restart history, so retries cannot reset the restart budget.
    fn sync_watchdog(&mut self) {
        let active = self.wants_driver() && self.driver.is_running();
        if active == self.watchdog.is_nudger_running() {
            return;
        }
        if !active {
            self.watchdog.set_nudger_running(false);
            self.throttled = false;
        } else if self.recovering {
            self.recovering = false;
            self.watchdog.resume_after_restart();
        } else {
            self.watchdog.set_nudger_running(true);
        }
    }

    fn publish(&self) {
        self.status.send_replace(SupervisorStatus {
            driver_state: self.driver.state(),
            retry_count: self.driver.retry_count(),
            start_exhausted: self.driver.is_exhausted(),
            tick_rate_hz: self.driver.tick_rate(),
            restarts_in_window: self.watchdog.restarts_in_window(),
            throttled: self.throttled,
            paused: self.paused,
            sleeping: self.sleeping,
            target: self.driver.target(),
            ticks_observed: self.ticks_observed,
        });
    }
}

fn suspend_reason(reason: SuspendReason) -> &'static str {
    match reason {
        SuspendReason::Sleep => "system sleep",
        SuspendReason::User => "paused by user",
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("driver", &self.driver)
            .field("watchdog", &self.watchdog)
            .field("paused", &self.paused)
            .field("sleeping", &self.sleeping)
            .finish_non_exhaustive()
    }
}
