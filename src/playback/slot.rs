//! Video slot abstraction implemented by hosts
//!
//! A slot is one video surface. Playback start, start failure and end are
//! reported asynchronously as [`SlotEvent`]s carrying the [`PlayTicket`] of
//! the `play` call they answer, so late events from a superseded play can be
//! told apart from current ones.

use crate::media::PlayableHandle;
use crate::Result;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two interchangeable slots
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    pub fn other(self) -> SlotId {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            SlotId::A => 0,
            SlotId::B => 1,
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotId::A => write!(f, "A"),
            SlotId::B => write!(f, "B"),
        }
    }
}

/// Identifies one `play` call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayTicket(u64);

impl PlayTicket {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Asynchronous playback notifications from a slot
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotEvent {
    /// Playback began
    Started { slot: SlotId, ticket: PlayTicket },
    /// The platform refused to start playback (e.g. autoplay policy)
    StartFailed {
        slot: SlotId,
        ticket: PlayTicket,
        reason: String,
    },
    /// The clip played to the end
    Ended { slot: SlotId, ticket: PlayTicket },
}

impl SlotEvent {
    pub fn slot(&self) -> SlotId {
        match self {
            SlotEvent::Started { slot, .. }
            | SlotEvent::StartFailed { slot, .. }
            | SlotEvent::Ended { slot, .. } => *slot,
        }
    }

    pub fn ticket(&self) -> PlayTicket {
        match self {
            SlotEvent::Started { ticket, .. }
            | SlotEvent::StartFailed { ticket, .. }
            | SlotEvent::Ended { ticket, .. } => *ticket,
        }
    }
}

/// A host video surface
pub trait VideoSlot: Send {
    /// Called once by the controller before any other method
    fn connect(&mut self, id: SlotId, events: Sender<SlotEvent>);

    /// Load a clip as the slot's source
    fn attach(&mut self, clip: &PlayableHandle) -> Result<()>;

    /// Seek to the start of the attached clip
    fn rewind(&mut self);

    /// Start playback; the outcome is reported as a `SlotEvent` with `ticket`
    fn play(&mut self, ticket: PlayTicket);

    fn pause(&mut self);

    fn set_visible(&mut self, visible: bool);

    /// True while a clip is actually playing
    fn is_playing(&self) -> bool;
}

impl<S: VideoSlot + ?Sized> VideoSlot for Box<S> {
    fn connect(&mut self, id: SlotId, events: Sender<SlotEvent>) {
        (**self).connect(id, events)
    }

    fn attach(&mut self, clip: &PlayableHandle) -> Result<()> {
        (**self).attach(clip)
    }

    fn rewind(&mut self) {
        (**self).rewind()
    }

    fn play(&mut self, ticket: PlayTicket) {
        (**self).play(ticket)
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn set_visible(&mut self, visible: bool) {
        (**self).set_visible(visible)
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }
}
