//! Scripted stand-ins for host components, shared by unit tests

#![allow(dead_code)]

use crate::conversation::ConversationState;
use crate::media::{AssetCache, AssetCatalog, Locator, MediaSource, PlayableHandle};
use crate::playback::{PlayTicket, SlotEvent, SlotId, VideoSlot};
use crate::speech::{RecognitionErrorCode, RecognitionSettings, Recognizer, RecognizerEvent, SpeechCapability};
use crate::{Result, TheatreError};
use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

pub const MP4_HEADER: &[u8] = &[0, 0, 0, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm'];

pub fn mp4_handle(locator: &str) -> PlayableHandle {
    PlayableHandle::from_bytes(Locator::new(locator), MP4_HEADER.to_vec()).unwrap()
}

/// Media source whose loads block until the gate opens
#[derive(Default)]
pub struct GatedSource {
    open: Mutex<bool>,
    gate: Condvar,
    loads: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
}

impl GatedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.gate.notify_all();
    }

    pub fn fail(&self, locator: &str) {
        self.failing.lock().insert(locator.to_string());
    }

    pub fn heal(&self, locator: &str) {
        self.failing.lock().remove(locator);
    }

    pub fn loads_of(&self, locator: &str) -> usize {
        self.loads.lock().get(locator).copied().unwrap_or(0)
    }

    pub fn total_loads(&self) -> usize {
        self.loads.lock().values().sum()
    }
}

impl MediaSource for GatedSource {
    fn load(&self, locator: &Locator) -> Result<PlayableHandle> {
        *self.loads.lock().entry(locator.to_string()).or_default() += 1;
        {
            let mut open = self.open.lock();
            while !*open {
                self.gate.wait(&mut open);
            }
        }
        if self.failing.lock().contains(locator.as_str()) {
            return Err(TheatreError::AssetLoadError(format!("{} not found", locator)));
        }
        Ok(mp4_handle(locator.as_str()))
    }
}

/// A cache with the given states already loaded from the default catalog
pub fn ready_cache(states: &[ConversationState]) -> AssetCache {
    let source = GatedSource::new();
    source.open();
    let mut cache = AssetCache::new(AssetCatalog::default(), source);
    let started = cache.request(states.iter().copied());
    let rx = cache.outcomes();
    for _ in 0..started.len() {
        let outcome = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        cache.complete(outcome);
    }
    cache
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotMode {
    /// Tests deliver start/end themselves through the probe
    Manual,
    /// Report `Started` as soon as `play` is called
    AutoStart,
    /// Report `StartFailed` for every `play`
    Refuse,
}

#[derive(Default)]
struct SlotLog {
    id: Option<SlotId>,
    events: Option<Sender<SlotEvent>>,
    mode: Option<SlotMode>,
    attached: Option<String>,
    attach_fails: bool,
    visible: bool,
    playing: bool,
    last_ticket: Option<PlayTicket>,
    plays: usize,
    pauses: usize,
    rewinds: usize,
}

pub struct FakeSlot {
    log: Arc<Mutex<SlotLog>>,
}

/// Test-side view of a `FakeSlot` after it moved into a controller
#[derive(Clone)]
pub struct SlotProbe {
    log: Arc<Mutex<SlotLog>>,
}

impl FakeSlot {
    pub fn new(mode: SlotMode) -> (Self, SlotProbe) {
        let log = Arc::new(Mutex::new(SlotLog {
            mode: Some(mode),
            ..Default::default()
        }));
        (Self { log: log.clone() }, SlotProbe { log })
    }
}

impl VideoSlot for FakeSlot {
    fn connect(&mut self, id: SlotId, events: Sender<SlotEvent>) {
        let mut log = self.log.lock();
        log.id = Some(id);
        log.events = Some(events);
    }

    fn attach(&mut self, clip: &PlayableHandle) -> Result<()> {
        let mut log = self.log.lock();
        if log.attach_fails {
            return Err(TheatreError::PlaybackError("decoder error".into()));
        }
        log.attached = Some(clip.locator().to_string());
        Ok(())
    }

    fn rewind(&mut self) {
        self.log.lock().rewinds += 1;
    }

    fn play(&mut self, ticket: PlayTicket) {
        let mut log = self.log.lock();
        log.plays += 1;
        log.last_ticket = Some(ticket);
        let (Some(slot), Some(events)) = (log.id, log.events.clone()) else {
            return;
        };
        match log.mode {
            Some(SlotMode::AutoStart) => {
                log.playing = true;
                let _ = events.send(SlotEvent::Started { slot, ticket });
            }
            Some(SlotMode::Refuse) => {
                let _ = events.send(SlotEvent::StartFailed {
                    slot,
                    ticket,
                    reason: "autoplay blocked".into(),
                });
            }
            _ => {}
        }
    }

    fn pause(&mut self) {
        let mut log = self.log.lock();
        log.pauses += 1;
        log.playing = false;
    }

    fn set_visible(&mut self, visible: bool) {
        self.log.lock().visible = visible;
    }

    fn is_playing(&self) -> bool {
        self.log.lock().playing
    }
}

impl SlotProbe {
    fn emit(&self, make: impl FnOnce(SlotId, PlayTicket) -> SlotEvent) {
        let log = self.log.lock();
        if let (Some(slot), Some(ticket), Some(events)) = (log.id, log.last_ticket, log.events.as_ref()) {
            let _ = events.send(make(slot, ticket));
        }
    }

    /// Report that the last `play` started
    pub fn start(&self) {
        self.log.lock().playing = true;
        self.emit(|slot, ticket| SlotEvent::Started { slot, ticket });
    }

    /// Report that the last `play` was refused
    pub fn refuse(&self, reason: &str) {
        let reason = reason.to_string();
        self.emit(move |slot, ticket| SlotEvent::StartFailed { slot, ticket, reason });
    }

    /// Report that the clip from the last `play` ended
    pub fn finish(&self) {
        self.log.lock().playing = false;
        self.emit(|slot, ticket| SlotEvent::Ended { slot, ticket });
    }

    /// Stop playing without reporting anything
    pub fn stall(&self) {
        self.log.lock().playing = false;
    }

    pub fn set_mode(&self, mode: SlotMode) {
        self.log.lock().mode = Some(mode);
    }

    pub fn fail_attach(&self) {
        self.log.lock().attach_fails = true;
    }

    pub fn attached(&self) -> Option<String> {
        self.log.lock().attached.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.log.lock().visible
    }

    pub fn is_playing(&self) -> bool {
        self.log.lock().playing
    }

    pub fn plays(&self) -> usize {
        self.log.lock().plays
    }

    pub fn pauses(&self) -> usize {
        self.log.lock().pauses
    }

    pub fn rewinds(&self) -> usize {
        self.log.lock().rewinds
    }
}

#[derive(Default)]
struct SpeechLog {
    available: bool,
    events: Option<Sender<RecognizerEvent>>,
    opens: usize,
    starts: usize,
    stops: usize,
    aborts: usize,
    listening: bool,
}

pub struct FakeSpeech {
    log: Arc<Mutex<SpeechLog>>,
}

struct FakeRecognizer {
    log: Arc<Mutex<SpeechLog>>,
}

#[derive(Clone)]
pub struct SpeechProbe {
    log: Arc<Mutex<SpeechLog>>,
}

impl FakeSpeech {
    pub fn new(available: bool) -> (Self, SpeechProbe) {
        let log = Arc::new(Mutex::new(SpeechLog {
            available,
            ..Default::default()
        }));
        (Self { log: log.clone() }, SpeechProbe { log })
    }
}

impl SpeechCapability for FakeSpeech {
    fn open(
        &mut self,
        _settings: &RecognitionSettings,
        events: Sender<RecognizerEvent>,
    ) -> Result<Box<dyn Recognizer>> {
        let mut log = self.log.lock();
        log.opens += 1;
        if !log.available {
            return Err(TheatreError::SpeechUnavailable("no recogniser".into()));
        }
        log.events = Some(events);
        Ok(Box::new(FakeRecognizer {
            log: self.log.clone(),
        }))
    }
}

impl Recognizer for FakeRecognizer {
    fn start(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        log.starts += 1;
        log.listening = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        log.stops += 1;
        log.listening = false;
        Ok(())
    }

    fn abort(&mut self) {
        let mut log = self.log.lock();
        log.aborts += 1;
        log.listening = false;
    }
}

impl SpeechProbe {
    fn send(&self, events: &[RecognizerEvent]) {
        let mut log = self.log.lock();
        log.listening = false;
        if let Some(tx) = log.events.as_ref() {
            for event in events {
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Deliver an utterance followed by the end of the turn
    pub fn say(&self, text: &str) {
        self.send(&[RecognizerEvent::Result(text.to_string()), RecognizerEvent::End]);
    }

    /// Deliver an error followed by the end of the turn
    pub fn fail(&self, code: RecognitionErrorCode) {
        self.send(&[RecognizerEvent::Error(code), RecognizerEvent::End]);
    }

    pub fn opens(&self) -> usize {
        self.log.lock().opens
    }

    pub fn starts(&self) -> usize {
        self.log.lock().starts
    }

    pub fn stops(&self) -> usize {
        self.log.lock().stops
    }

    pub fn aborts(&self) -> usize {
        self.log.lock().aborts
    }

    pub fn is_listening(&self) -> bool {
        self.log.lock().listening
    }
}
