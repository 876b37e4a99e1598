//! Simulated media and video surfaces
//!
//! Stand-ins for a real player: clips "play" for a fixed time on a timer
//! thread, and an [`AutoplayGate`] can refuse playback until the user
//! interacts, the way browsers block unmuted autoplay.

use crate::media::{Locator, MediaSource, PlayableHandle};
use crate::playback::{PlayTicket, SlotEvent, SlotId, VideoSlot};
use crate::{Result, TheatreError};
use crossbeam_channel::Sender;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Smallest byte string recognised as an MP4 container
const SYNTHETIC_MP4: &[u8] = &[0, 0, 0, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm'];

/// Media source that fabricates a clip for every locator
#[derive(Debug, Default)]
pub struct SyntheticSource {
    latency: Duration,
    missing: HashSet<String>,
    loads: AtomicUsize,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every load by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make loads of `locator` fail
    pub fn with_missing(mut self, locator: impl Into<String>) -> Self {
        self.missing.insert(locator.into());
        self
    }

    /// Loads served so far, failed ones included
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl MediaSource for SyntheticSource {
    fn load(&self, locator: &Locator) -> Result<PlayableHandle> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        if self.missing.contains(locator.as_str()) {
            return Err(TheatreError::AssetLoadError(format!("{} not found", locator)));
        }
        PlayableHandle::from_bytes(locator.clone(), SYNTHETIC_MP4.to_vec())
    }
}

/// Shared autoplay permission; locked gates refuse every `play`
#[derive(Clone, Debug)]
pub struct AutoplayGate {
    unlocked: Arc<AtomicBool>,
}

impl AutoplayGate {
    pub fn locked() -> Self {
        Self {
            unlocked: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn unlocked() -> Self {
        Self {
            unlocked: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Record a user gesture
    pub fn unlock(&self) {
        self.unlocked.store(true, Ordering::Release);
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::Acquire)
    }
}

impl Default for AutoplayGate {
    fn default() -> Self {
        Self::unlocked()
    }
}

/// Video surface that plays each clip for a fixed time
pub struct SimulatedSlot {
    id: Option<SlotId>,
    events: Option<Sender<SlotEvent>>,
    attached: Option<Locator>,
    clip_length: Duration,
    gate: AutoplayGate,
    visible: bool,
    playing: Arc<AtomicBool>,
    /// Bumped on every play and pause; a timer only fires for its own generation
    generation: Arc<AtomicU64>,
}

impl SimulatedSlot {
    pub fn new(clip_length: Duration) -> Self {
        Self {
            id: None,
            events: None,
            attached: None,
            clip_length,
            gate: AutoplayGate::default(),
            visible: false,
            playing: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_gate(mut self, gate: AutoplayGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn attached(&self) -> Option<&Locator> {
        self.attached.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    fn send(&self, event: SlotEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

impl VideoSlot for SimulatedSlot {
    fn connect(&mut self, id: SlotId, events: Sender<SlotEvent>) {
        self.id = Some(id);
        self.events = Some(events);
    }

    fn attach(&mut self, clip: &PlayableHandle) -> Result<()> {
        trace!("Slot {:?} attached {} ({})", self.id, clip.locator(), clip.format().mime_type());
        self.attached = Some(clip.locator().clone());
        Ok(())
    }

    fn rewind(&mut self) {}

    fn play(&mut self, ticket: PlayTicket) {
        let Some(slot) = self.id else {
            return;
        };

        if !self.gate.is_unlocked() {
            debug!("Slot {} refused to play, autoplay locked", slot);
            self.send(SlotEvent::StartFailed {
                slot,
                ticket,
                reason: "autoplay requires user interaction".to_string(),
            });
            return;
        }
        if self.attached.is_none() {
            self.send(SlotEvent::StartFailed {
                slot,
                ticket,
                reason: "no source attached".to_string(),
            });
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.playing.store(true, Ordering::Release);
        self.send(SlotEvent::Started { slot, ticket });

        let Some(events) = self.events.clone() else {
            return;
        };
        let current = Arc::clone(&self.generation);
        let playing = Arc::clone(&self.playing);
        let length = self.clip_length;
        let spawned = thread::Builder::new()
            .name(format!("theatre-slot-{}", slot))
            .spawn(move || {
                thread::sleep(length);
                if current.load(Ordering::Acquire) == generation {
                    playing.store(false, Ordering::Release);
                    let _ = events.send(SlotEvent::Ended { slot, ticket });
                }
            });
        if let Err(e) = spawned {
            error!("Failed to start playback timer for slot {}: {}", slot, e);
            self.playing.store(false, Ordering::Release);
        }
    }

    fn pause(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.playing.store(false, Ordering::Release);
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }
}
