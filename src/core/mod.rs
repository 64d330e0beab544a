//! frame-nudger core module
//!
//! Shared error types, the injectable clock and the serialized event queue
//! every liveness component posts into.

pub mod clock;
pub mod error;
pub mod event;

// Re-export commonly used items
pub use clock::{Clock, ManualClock, SharedClock, TokioClock};
pub use error::{NudgerError, Result, TickSourceError};
pub use event::{channel, Event, EventSender, ScheduledEvent, SuspendReason};
