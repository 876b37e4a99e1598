//! Video slots and the dual-buffer controller that alternates between them

pub mod controller;
pub mod slot;

pub use controller::{DualBuffer, PlaybackSignal, PresentOutcome};
pub use slot::{PlayTicket, SlotEvent, SlotId, VideoSlot};
