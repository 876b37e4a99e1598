//! Dual-buffer playback controller
//!
//! Two slots alternate: the next clip loads and starts in the hidden slot and
//! only becomes visible once its playback has actually begun, so the user
//! never sees a blank or reloading frame. The controller is the only writer
//! of slot visibility, and every flip goes through [`DualBuffer::swap`].

use super::slot::{PlayTicket, SlotEvent, SlotId, VideoSlot};
use crate::conversation::ConversationState;
use crate::media::{AssetCache, Locator};
use crossbeam_channel::Sender;
use tracing::{debug, error, info, warn};

/// Result of asking the controller to show a state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The same target is already loading
    Ignored,
    /// The target's clip is already on screen
    Unchanged,
    /// The clip is not cached yet; nothing changed on screen
    Unavailable,
    /// The clip could not be attached to the hidden slot
    Failed,
    /// The clip is starting in the hidden slot
    Loading(PlayTicket),
    /// The visible slot was asked to play again
    Resumed(PlayTicket),
}

/// What the session needs to know about playback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackSignal {
    /// A state's clip is now visible and playing
    Presented {
        state: ConversationState,
        slot: SlotId,
    },
    /// Playback was refused; the user must interact before it can start
    InteractionRequired { state: Option<ConversationState> },
    /// The visible clip played to the end
    ClipFinished(ConversationState),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct InFlight {
    target: ConversationState,
    locator: Locator,
    slot: SlotId,
    ticket: PlayTicket,
}

/// The controller's view of what is on screen, updated as one record
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct PlaybackRecord {
    /// State whose clip is visible
    represented: Option<ConversationState>,
    /// Locator of the visible clip
    loaded: Option<Locator>,
    in_flight: Option<InFlight>,
}

struct SlotCell<S> {
    slot: S,
    ticket: Option<PlayTicket>,
}

/// Double-buffered clip player
pub struct DualBuffer<S: VideoSlot> {
    cells: [SlotCell<S>; 2],
    visible: SlotId,
    record: PlaybackRecord,
    /// Target whose start was refused, retried after user interaction
    stalled: Option<ConversationState>,
    next_ticket: u64,
}

impl<S: VideoSlot> DualBuffer<S> {
    /// Take ownership of both slots; slot `A` starts out visible
    pub fn new(mut a: S, mut b: S, events: Sender<SlotEvent>) -> Self {
        a.connect(SlotId::A, events.clone());
        b.connect(SlotId::B, events);
        a.set_visible(true);
        b.set_visible(false);

        Self {
            cells: [SlotCell { slot: a, ticket: None }, SlotCell { slot: b, ticket: None }],
            visible: SlotId::A,
            record: PlaybackRecord::default(),
            stalled: None,
            next_ticket: 0,
        }
    }

    pub fn visible(&self) -> SlotId {
        self.visible
    }

    pub fn hidden(&self) -> SlotId {
        self.visible.other()
    }

    /// State whose clip is currently visible
    pub fn represented(&self) -> Option<ConversationState> {
        self.record.represented
    }

    /// Locator of the visible clip
    pub fn loaded(&self) -> Option<&Locator> {
        self.record.loaded.as_ref()
    }

    /// Target currently starting in the hidden slot
    pub fn in_flight(&self) -> Option<ConversationState> {
        self.record.in_flight.as_ref().map(|f| f.target)
    }

    /// Target waiting for user interaction
    pub fn stalled(&self) -> Option<ConversationState> {
        self.stalled
    }

    pub fn slot(&self, id: SlotId) -> &S {
        &self.cells[id.index()].slot
    }

    pub fn visible_is_playing(&self) -> bool {
        self.slot(self.visible).is_playing()
    }

    fn cell_mut(&mut self, id: SlotId) -> &mut SlotCell<S> {
        &mut self.cells[id.index()]
    }

    fn issue_ticket(&mut self) -> PlayTicket {
        self.next_ticket += 1;
        PlayTicket::new(self.next_ticket)
    }

    /// Show the clip for `target`
    pub fn present(&mut self, target: ConversationState, cache: &AssetCache) -> PresentOutcome {
        if self.in_flight() == Some(target) {
            debug!("{} is already starting, ignoring", target);
            return PresentOutcome::Ignored;
        }
        if self.stalled.is_some_and(|stalled| stalled != target) {
            debug!("Dropping stalled {:?}, {} is wanted now", self.stalled, target);
            self.stalled = None;
        }

        let Some(locator) = cache.catalog().locator(target).cloned() else {
            warn!("No clip configured for {}", target);
            self.abandon_in_flight();
            return PresentOutcome::Unavailable;
        };

        if self.record.loaded.as_ref() == Some(&locator) {
            let resumed = self.abandon_in_flight();
            self.record.represented = Some(target);
            if let Some(resumed) = resumed {
                return resumed;
            }
            if self.visible_is_playing() {
                debug!("{} already on screen", target);
                return PresentOutcome::Unchanged;
            }
            // The visible clip ended or was paused; play it again
            debug!("Replaying {} in slot {}", target, self.visible);
            return self.replay_visible().unwrap_or(PresentOutcome::Unchanged);
        }

        let Some(clip) = cache.resolve(target) else {
            warn!("Video for state {} not found in cache", target);
            self.abandon_in_flight();
            return PresentOutcome::Unavailable;
        };

        if let Some(previous) = self.record.in_flight.take() {
            info!("Overriding in-flight {} with {}", previous.target, target);
            self.cell_mut(previous.slot).slot.pause();
        }

        let visible = self.visible;
        let hidden = self.hidden();
        self.cell_mut(visible).slot.pause();

        if let Err(e) = self.cell_mut(hidden).slot.attach(&clip) {
            error!("Failed to attach {} to slot {}: {}", target, hidden, e);
            self.cell_mut(hidden).ticket = None;
            self.resume_visible();
            return PresentOutcome::Failed;
        }

        let ticket = self.issue_ticket();
        let cell = self.cell_mut(hidden);
        cell.slot.rewind();
        cell.ticket = Some(ticket);
        self.record.in_flight = Some(InFlight {
            target,
            locator,
            slot: hidden,
            ticket,
        });
        debug!("Starting {} in slot {} ({:?})", target, hidden, ticket);
        self.cell_mut(hidden).slot.play(ticket);

        PresentOutcome::Loading(ticket)
    }

    /// Cancel a hidden-slot load that is no longer wanted and put the
    /// visible clip back in motion
    fn abandon_in_flight(&mut self) -> Option<PresentOutcome> {
        let abandoned = self.record.in_flight.take()?;
        debug!("Abandoning in-flight {}", abandoned.target);
        let cell = self.cell_mut(abandoned.slot);
        cell.slot.pause();
        cell.ticket = None;
        self.resume_visible()
    }

    fn replay_visible(&mut self) -> Option<PresentOutcome> {
        let visible = self.visible;
        self.cell_mut(visible).slot.rewind();
        self.resume_visible()
    }

    fn resume_visible(&mut self) -> Option<PresentOutcome> {
        self.record.loaded.as_ref()?;
        let ticket = self.issue_ticket();
        let visible = self.visible;
        let cell = self.cell_mut(visible);
        cell.ticket = Some(ticket);
        cell.slot.play(ticket);
        Some(PresentOutcome::Resumed(ticket))
    }

    /// Flip visibility; the only place slot visibility changes
    fn swap(&mut self) {
        let previous = self.visible;
        let next = previous.other();
        self.cell_mut(next).slot.set_visible(true);
        let old = self.cell_mut(previous);
        old.slot.set_visible(false);
        old.slot.pause();
        self.visible = next;
    }

    /// Process a slot notification
    pub fn on_slot_event(&mut self, event: SlotEvent) -> Option<PlaybackSignal> {
        let slot = event.slot();
        let ticket = event.ticket();
        let is_current = self.cells[slot.index()].ticket == Some(ticket);
        let in_flight_match = self
            .record
            .in_flight
            .as_ref()
            .is_some_and(|f| f.slot == slot && f.ticket == ticket);

        match event {
            SlotEvent::Started { .. } if in_flight_match => {
                let flight = self.record.in_flight.take()?;
                self.swap();
                self.record.represented = Some(flight.target);
                self.record.loaded = Some(flight.locator);
                self.stalled = None;
                info!("Now showing {} in slot {}", flight.target, slot);
                Some(PlaybackSignal::Presented {
                    state: flight.target,
                    slot,
                })
            }
            SlotEvent::Started { .. } => {
                if slot == self.visible && is_current {
                    debug!("Slot {} resumed", slot);
                } else {
                    debug!("Ignoring stale start from slot {}", slot);
                }
                None
            }
            SlotEvent::StartFailed { reason, .. } if in_flight_match => {
                let flight = self.record.in_flight.take()?;
                error!("Failed to play buffer video for {}: {}", flight.target, reason);
                self.cell_mut(slot).ticket = None;
                self.stalled = Some(flight.target);
                Some(PlaybackSignal::InteractionRequired {
                    state: Some(flight.target),
                })
            }
            SlotEvent::StartFailed { reason, .. } => {
                if slot == self.visible && is_current {
                    warn!("Visible slot {} refused to play: {}", slot, reason);
                    Some(PlaybackSignal::InteractionRequired {
                        state: self.record.represented,
                    })
                } else {
                    debug!("Ignoring stale start failure from slot {}", slot);
                    None
                }
            }
            SlotEvent::Ended { .. } => {
                if slot != self.visible || !is_current {
                    debug!("Ignoring end from hidden or superseded slot {}", slot);
                    return None;
                }
                let state = self.record.represented?;
                debug!("{} clip finished", state);
                Some(PlaybackSignal::ClipFinished(state))
            }
        }
    }

    /// The user interacted after playback was refused: retry the stalled
    /// target once, otherwise restart the visible clip
    pub fn resume_after_interaction(&mut self, cache: &AssetCache) -> Option<PresentOutcome> {
        if let Some(target) = self.stalled.take() {
            info!("Retrying {} after user interaction", target);
            return Some(self.present(target, cache));
        }
        self.resume_visible()
    }

    /// Pause both slots and forget any in-flight load
    pub fn halt(&mut self) {
        self.record.in_flight = None;
        self.stalled = None;
        for cell in self.cells.iter_mut() {
            cell.slot.pause();
            cell.ticket = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{ready_cache, FakeSlot, SlotMode, SlotProbe};
    use crossbeam_channel::{unbounded, Receiver};
    use ConversationState::*;

    struct Rig {
        buffer: DualBuffer<FakeSlot>,
        cache: AssetCache,
        a: SlotProbe,
        b: SlotProbe,
        events: Receiver<SlotEvent>,
    }

    impl Rig {
        fn new(states: &[ConversationState]) -> Self {
            let (tx, events) = unbounded();
            let (slot_a, a) = FakeSlot::new(SlotMode::Manual);
            let (slot_b, b) = FakeSlot::new(SlotMode::Manual);
            Self {
                buffer: DualBuffer::new(slot_a, slot_b, tx),
                cache: ready_cache(states),
                a,
                b,
                events,
            }
        }

        fn probe(&self, id: SlotId) -> &SlotProbe {
            match id {
                SlotId::A => &self.a,
                SlotId::B => &self.b,
            }
        }

        /// Present and confirm playback start
        fn show(&mut self, state: ConversationState) {
            let hidden = self.buffer.hidden();
            let outcome = self.buffer.present(state, &self.cache);
            assert!(matches!(outcome, PresentOutcome::Loading(_)), "{:?}", outcome);
            self.probe(hidden).start();
            let event = self.events.try_recv().unwrap();
            assert_eq!(
                self.buffer.on_slot_event(event),
                Some(PlaybackSignal::Presented { state, slot: hidden })
            );
        }

        fn exactly_one_visible(&self) -> bool {
            self.a.is_visible() != self.b.is_visible()
        }
    }

    #[test]
    fn test_present_loads_hidden_then_swaps() {
        let mut rig = Rig::new(&[Greeting]);
        assert_eq!(rig.buffer.visible(), SlotId::A);
        assert!(rig.exactly_one_visible());

        let outcome = rig.buffer.present(Greeting, &rig.cache);
        assert!(matches!(outcome, PresentOutcome::Loading(_)));
        assert_eq!(rig.b.attached().as_deref(), Some("greeting.mp4"));
        assert_eq!(rig.b.rewinds(), 1);
        assert!(rig.a.pauses() >= 1);
        // Not swapped until playback starts
        assert_eq!(rig.buffer.visible(), SlotId::A);
        assert_eq!(rig.buffer.represented(), None);

        rig.b.start();
        let signal = rig.buffer.on_slot_event(rig.events.try_recv().unwrap());
        assert_eq!(
            signal,
            Some(PlaybackSignal::Presented { state: Greeting, slot: SlotId::B })
        );
        assert_eq!(rig.buffer.visible(), SlotId::B);
        assert!(rig.b.is_visible() && !rig.a.is_visible());
        assert_eq!(rig.buffer.represented(), Some(Greeting));
        assert_eq!(rig.buffer.loaded(), Some(&Locator::new("greeting.mp4")));
    }

    #[test]
    fn test_same_clip_is_noop() {
        let mut rig = Rig::new(&[Greeting]);
        rig.show(Greeting);
        let plays = rig.a.plays() + rig.b.plays();

        assert_eq!(rig.buffer.present(Greeting, &rig.cache), PresentOutcome::Unchanged);
        assert_eq!(rig.a.plays() + rig.b.plays(), plays);
        assert_eq!(rig.buffer.visible(), SlotId::B);
    }

    #[test]
    fn test_finished_clip_replays_for_same_locator() {
        let mut rig = Rig::new(&[Greeting]);
        rig.show(Greeting);
        rig.b.finish();
        assert_eq!(
            rig.buffer.on_slot_event(rig.events.try_recv().unwrap()),
            Some(PlaybackSignal::ClipFinished(Greeting))
        );

        // Listening never made it into the cache, so Greeting stays on screen
        assert_eq!(rig.buffer.present(Listening, &rig.cache), PresentOutcome::Unavailable);
        let plays = rig.b.plays();
        let rewinds = rig.b.rewinds();

        let outcome = rig.buffer.present(Greeting, &rig.cache);
        assert!(matches!(outcome, PresentOutcome::Resumed(_)), "{:?}", outcome);
        assert_eq!(rig.b.plays(), plays + 1);
        assert_eq!(rig.b.rewinds(), rewinds + 1);
        assert_eq!(rig.buffer.visible(), SlotId::B);

        rig.b.start();
        assert_eq!(rig.buffer.on_slot_event(rig.events.try_recv().unwrap()), None);
        rig.b.finish();
        assert_eq!(
            rig.buffer.on_slot_event(rig.events.try_recv().unwrap()),
            Some(PlaybackSignal::ClipFinished(Greeting))
        );
    }

    #[test]
    fn test_new_target_replaces_stalled() {
        let mut rig = Rig::new(&[Greeting, Listening]);
        rig.show(Greeting);
        rig.buffer.present(Listening, &rig.cache);
        rig.a.refuse("autoplay blocked");
        rig.buffer.on_slot_event(rig.events.try_recv().unwrap());
        assert_eq!(rig.buffer.stalled(), Some(Listening));

        // The conversation moved back to Greeting before the user interacted
        let outcome = rig.buffer.present(Greeting, &rig.cache);
        assert!(matches!(outcome, PresentOutcome::Resumed(_)), "{:?}", outcome);
        assert_eq!(rig.buffer.stalled(), None);

        let a_plays = rig.a.plays();
        let retry = rig.buffer.resume_after_interaction(&rig.cache);
        assert!(matches!(retry, Some(PresentOutcome::Resumed(_))), "{:?}", retry);
        assert_eq!(rig.a.plays(), a_plays);
        assert_eq!(rig.buffer.in_flight(), None);
        assert_eq!(rig.buffer.represented(), Some(Greeting));
    }

    #[test]
    fn test_same_target_in_flight_ignored() {
        let mut rig = Rig::new(&[Weather]);
        assert!(matches!(rig.buffer.present(Weather, &rig.cache), PresentOutcome::Loading(_)));
        assert_eq!(rig.buffer.present(Weather, &rig.cache), PresentOutcome::Ignored);
        assert_eq!(rig.b.plays(), 1);
    }

    #[test]
    fn test_different_target_overrides_in_flight() {
        let mut rig = Rig::new(&[Listening, Weather, Goodbye]);
        rig.show(Listening);

        // Weather starts loading in A, then the user exits
        let weather = rig.buffer.present(Weather, &rig.cache);
        let PresentOutcome::Loading(weather_ticket) = weather else {
            panic!("expected loading, got {:?}", weather);
        };
        let goodbye = rig.buffer.present(Goodbye, &rig.cache);
        assert!(matches!(goodbye, PresentOutcome::Loading(_)));
        assert_eq!(rig.buffer.in_flight(), Some(Goodbye));
        assert_eq!(rig.a.attached().as_deref(), Some("goodbye.mp4"));

        // A late start for the weather ticket changes nothing
        let stale = SlotEvent::Started { slot: SlotId::A, ticket: weather_ticket };
        assert_eq!(rig.buffer.on_slot_event(stale), None);
        assert_eq!(rig.buffer.visible(), SlotId::B);

        rig.a.start();
        let signal = rig.buffer.on_slot_event(rig.events.try_recv().unwrap());
        assert_eq!(
            signal,
            Some(PlaybackSignal::Presented { state: Goodbye, slot: SlotId::A })
        );
    }

    #[test]
    fn test_uncached_target_leaves_screen_alone() {
        let mut rig = Rig::new(&[Greeting]);
        rig.show(Greeting);
        assert_eq!(rig.buffer.present(Weather, &rig.cache), PresentOutcome::Unavailable);
        assert_eq!(rig.buffer.represented(), Some(Greeting));
        assert_eq!(rig.buffer.visible(), SlotId::B);
        assert_eq!(rig.buffer.in_flight(), None);
    }

    #[test]
    fn test_start_failure_keeps_visibility() {
        let mut rig = Rig::new(&[Greeting, Listening]);
        rig.show(Greeting);

        rig.buffer.present(Listening, &rig.cache);
        rig.a.refuse("autoplay blocked");
        let signal = rig.buffer.on_slot_event(rig.events.try_recv().unwrap());
        assert_eq!(
            signal,
            Some(PlaybackSignal::InteractionRequired { state: Some(Listening) })
        );
        assert_eq!(rig.buffer.visible(), SlotId::B);
        assert_eq!(rig.buffer.in_flight(), None);
        assert_eq!(rig.buffer.stalled(), Some(Listening));
        assert!(rig.exactly_one_visible());

        // One retry after the user interacts
        let retry = rig.buffer.resume_after_interaction(&rig.cache);
        assert!(matches!(retry, Some(PresentOutcome::Loading(_))));
        assert_eq!(rig.buffer.stalled(), None);
        rig.a.start();
        let signal = rig.buffer.on_slot_event(rig.events.try_recv().unwrap());
        assert_eq!(
            signal,
            Some(PlaybackSignal::Presented { state: Listening, slot: SlotId::A })
        );
    }

    #[test]
    fn test_only_visible_end_counts() {
        let mut rig = Rig::new(&[Greeting, Listening]);
        rig.show(Greeting);
        rig.show(Listening);
        assert_eq!(rig.buffer.visible(), SlotId::A);

        // Hidden slot B still holds the greeting ticket
        rig.b.finish();
        assert_eq!(rig.buffer.on_slot_event(rig.events.try_recv().unwrap()), None);

        rig.a.finish();
        assert_eq!(
            rig.buffer.on_slot_event(rig.events.try_recv().unwrap()),
            Some(PlaybackSignal::ClipFinished(Listening))
        );
        assert!(rig.exactly_one_visible());
    }

    #[test]
    fn test_returning_to_visible_clip_cancels_in_flight() {
        let mut rig = Rig::new(&[Listening, Weather]);
        rig.show(Listening);
        rig.buffer.present(Weather, &rig.cache);

        let outcome = rig.buffer.present(Listening, &rig.cache);
        assert!(matches!(outcome, PresentOutcome::Resumed(_)));
        assert_eq!(rig.buffer.in_flight(), None);
        assert_eq!(rig.buffer.visible(), SlotId::B);
    }

    #[test]
    fn test_attach_failure_reports_failed() {
        let mut rig = Rig::new(&[Greeting]);
        rig.b.fail_attach();
        assert_eq!(rig.buffer.present(Greeting, &rig.cache), PresentOutcome::Failed);
        assert_eq!(rig.buffer.in_flight(), None);
        assert_eq!(rig.buffer.visible(), SlotId::A);
    }

    #[test]
    fn test_halt_pauses_everything() {
        let mut rig = Rig::new(&[Greeting, Listening]);
        rig.show(Greeting);
        rig.buffer.present(Listening, &rig.cache);
        rig.buffer.halt();
        assert_eq!(rig.buffer.in_flight(), None);
        assert!(!rig.a.is_playing() && !rig.b.is_playing());
    }
}
