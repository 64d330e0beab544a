//! Serialized event queue
//!
//! Every state transition of the driver and the watchdog happens while the
//! owner drains one unbounded queue of [`Event`]s. Timers and the tick
//! source's own thread never touch component state; they only enqueue.
//!
//! Components hold an [`EventSender`], which wraps a weak sender: it never
//! keeps the owner's queue alive, and emitting after the owner is gone is a
//! silent no-op.

use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Why the driver is being suspended or resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    /// The system is going to sleep / has woken
    Sleep,
    /// The user paused / resumed from the menu
    User,
}

/// Messages processed on the serialized context
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// One period of the tick source, tagged with the start cycle that produced it
    Tick { cycle: u64, at: Instant },
    /// A backoff delay elapsed
    RetryDue { generation: u64 },
    /// Watchdog poll interval elapsed
    HealthPoll,
    /// The watchdog found ticks stale and wants the driver restarted
    RestartRequested,
    /// The watchdog found ticks stale but the restart budget is spent
    RestartThrottled { restarts: usize },
    /// Display configuration changed
    TopologyChanged,
    Suspend(SuspendReason),
    Resume(SuspendReason),
    Shutdown,
}

/// Create the owner's queue
pub fn channel() -> (UnboundedSender<Event>, UnboundedReceiver<Event>) {
    mpsc::unbounded_channel()
}

/// Non-owning handle used by components to post events
#[derive(Debug, Clone)]
pub struct EventSender {
    inner: WeakUnboundedSender<Event>,
}

impl EventSender {
    pub fn new(sender: &UnboundedSender<Event>) -> Self {
        Self {
            inner: sender.downgrade(),
        }
    }

    /// Post an event. Returns false when the owner is gone.
    pub fn emit(&self, event: Event) -> bool {
        match self.inner.upgrade() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }
}

/// A timer that posts an event once or periodically.
///
/// Dropping or cancelling aborts the timer task. Must be created from within
/// a tokio runtime.
#[derive(Debug)]
pub struct ScheduledEvent {
    handle: JoinHandle<()>,
}

impl ScheduledEvent {
    /// Post `event` once after `delay`
    pub fn after(delay: Duration, events: EventSender, event: Event) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.emit(event);
        });
        Self { handle }
    }

    /// Post `event` every `period`, first one period from now.
    /// Stops on its own once the owner is gone.
    pub fn every(period: Duration, events: EventSender, event: Event) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !events.emit(event.clone()) {
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn cancel(self) {
        // Drop aborts.
    }
}

impl Drop for ScheduledEvent {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
