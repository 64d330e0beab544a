//! OS integration layer for frame-nudger
//!
//! The liveness core talks to the platform through two seams:
//! - [`TickSource`]: the underlying periodic signal (a display link on
//!   platforms that have one, a software timer otherwise)
//! - [`DisplayDirectory`]: enumeration of the displays a source can bind to
//!
//! A tick source fires on its own thread. Its only way into the core is
//! [`TickSink::tick`], which posts an [`Event::Tick`] to the owner's queue.

pub mod stub;

#[cfg(test)]
mod tests;

pub use stub::{SoftwareTickSource, StaticDisplayDirectory};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::core::error::TickSourceError;
use crate::core::event::{Event, EventSender};

/// Identifier of a display endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayId(pub u32);

impl DisplayId {
    /// Id reported when nothing better is known
    pub const MAIN: DisplayId = DisplayId(0);
}

impl std::fmt::Display for DisplayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive display information, used for logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetadata {
    pub id: DisplayId,
    /// Display name/identifier
    #[serde(default)]
    pub name: String,
    /// Nominal refresh rate in Hz, if the platform reports one
    #[serde(default)]
    pub refresh_hz: Option<f64>,
    /// Whether this is the primary display
    #[serde(default)]
    pub is_primary: bool,
}

impl DisplayMetadata {
    pub fn new(id: DisplayId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            refresh_hz: None,
            is_primary: false,
        }
    }

    pub fn with_refresh_hz(mut self, hz: f64) -> Self {
        self.refresh_hz = Some(hz);
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

/// Handle a tick source uses to report each period.
///
/// Cheap to clone and safe to move onto a native callback thread. Ticks are
/// tagged with the start cycle they belong to, so ticks that arrive after a
/// stop or restart are discarded by the driver.
#[derive(Debug, Clone)]
pub struct TickSink {
    events: EventSender,
    cycle: u64,
}

impl TickSink {
    pub fn new(events: EventSender, cycle: u64) -> Self {
        Self { events, cycle }
    }

    /// Report one period now. Returns false once the owner is gone, which
    /// is the source's cue to stop its thread.
    pub fn tick(&self) -> bool {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&self, at: Instant) -> bool {
        self.events.emit(Event::Tick {
            cycle: self.cycle,
            at,
        })
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }
}

/// Underlying periodic signal
pub trait TickSource: Send {
    /// Create the source and start firing into `sink`
    fn create_and_start(&mut self, sink: TickSink) -> Result<(), TickSourceError>;

    /// Deactivate the source. Must be safe to call when already stopped.
    fn stop(&mut self);

    /// Bind the running source to a display
    fn set_target(&mut self, display: DisplayId) -> Result<(), TickSourceError>;

    /// Withdraw any on-screen artifact the source keeps while active
    fn conceal(&mut self) {}

    fn is_active(&self) -> bool;
}

/// Enumeration of display endpoints
pub trait DisplayDirectory: Send + Sync {
    /// Display the app currently knows it is on, if any
    fn current_known_target(&self) -> Option<DisplayId>;

    /// System-wide default display
    fn system_default_target(&self) -> DisplayId;

    fn metadata_for(&self, display: DisplayId) -> Option<DisplayMetadata>;

    fn displays(&self) -> Vec<DisplayMetadata>;
}

/// Pick the display to bind to: the known target if there is one, the system
/// default otherwise
pub fn select_target(directory: &dyn DisplayDirectory) -> DisplayId {
    directory
        .current_known_target()
        .unwrap_or_else(|| directory.system_default_target())
}
