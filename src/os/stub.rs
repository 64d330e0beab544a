//! Portable tick source and display directory
//!
//! Used on platforms without a native display link, and by the binary when
//! no platform source is configured. The software source ticks from a
//! dedicated thread at a fixed interval. The thread parks between ticks, so
//! `stop` wakes it and returns without waiting out the interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::{DisplayDirectory, DisplayId, DisplayMetadata, TickSink, TickSource};
use crate::core::error::TickSourceError;

/// Default period: roughly one 60 Hz frame
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

/// Tick source backed by a sleeping thread
pub struct SoftwareTickSource {
    interval: Duration,
    valid_targets: Vec<DisplayId>,
    target: Option<DisplayId>,
    /// Number of upcoming `create_and_start` calls that will fail
    failures_remaining: u32,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SoftwareTickSource {
    pub fn new(interval: Duration, valid_targets: Vec<DisplayId>) -> Self {
        Self {
            interval,
            valid_targets,
            target: None,
            failures_remaining: 0,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Make the next `count` start attempts fail
    pub fn with_start_failures(mut self, count: u32) -> Self {
        self.failures_remaining = count;
        self
    }

    pub fn target(&self) -> Option<DisplayId> {
        self.target
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl TickSource for SoftwareTickSource {
    fn create_and_start(&mut self, sink: TickSink) -> Result<(), TickSourceError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(TickSourceError::create_failed(format!(
                "simulated start failure ({} more queued)",
                self.failures_remaining
            )));
        }

        // Reap a thread left over from a previous cycle
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("tick-source".to_string())
            .spawn(move || {
                let mut next = Instant::now() + interval;
                while running.load(Ordering::SeqCst) {
                    let now = Instant::now();
                    if now < next {
                        // Wakes early on unpark or spuriously; loop re-checks
                        thread::park_timeout(next - now);
                        continue;
                    }
                    if !sink.tick() {
                        running.store(false, Ordering::SeqCst);
                        break;
                    }
                    next = Instant::now() + interval;
                }
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                TickSourceError::create_failed(e.to_string())
            })?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }

    fn set_target(&mut self, display: DisplayId) -> Result<(), TickSourceError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(TickSourceError::NotRunning);
        }
        if !self.valid_targets.contains(&display) {
            return Err(TickSourceError::SetTargetFailed {
                display,
                reason: "display is not connected".to_string(),
            });
        }
        self.target = Some(display);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for SoftwareTickSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fixed display list with an optionally known current display
#[derive(Debug, Default)]
pub struct StaticDisplayDirectory {
    displays: Vec<DisplayMetadata>,
    known_target: RwLock<Option<DisplayId>>,
}

impl StaticDisplayDirectory {
    pub fn new(displays: Vec<DisplayMetadata>) -> Self {
        Self {
            displays,
            known_target: RwLock::new(None),
        }
    }

    /// A single 60 Hz primary display
    pub fn single_display() -> Self {
        Self::new(vec![DisplayMetadata::new(DisplayId::MAIN, "Built-in Display")
            .with_refresh_hz(60.0)
            .primary()])
    }

    /// Record which display the app is currently on
    pub fn set_known_target(&self, display: Option<DisplayId>) {
        *self.known_target.write() = display;
    }

    pub fn ids(&self) -> Vec<DisplayId> {
        self.displays.iter().map(|d| d.id).collect()
    }
}

impl DisplayDirectory for StaticDisplayDirectory {
    fn current_known_target(&self) -> Option<DisplayId> {
        *self.known_target.read()
    }

    fn system_default_target(&self) -> DisplayId {
        self.displays
            .iter()
            .find(|d| d.is_primary)
            .or_else(|| self.displays.first())
            .map(|d| d.id)
            .unwrap_or(DisplayId::MAIN)
    }

    fn metadata_for(&self, display: DisplayId) -> Option<DisplayMetadata> {
        self.displays.iter().find(|d| d.id == display).cloned()
    }

    fn displays(&self) -> Vec<DisplayMetadata> {
        self.displays.clone()
    }
}
