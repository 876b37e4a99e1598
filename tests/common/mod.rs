//! Shared harness for session integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};
use theatre::host::{AutoplayGate, ConsoleSpeech, Microphone, SimulatedSlot, SyntheticSource};
use theatre::{
    ConversationState, Session, SessionEvent, SessionHandle, SessionParts, SpeechCapability, TheatreConfig,
    VideoSlot,
};

pub const WAIT: Duration = Duration::from_secs(3);

/// Config with timers short enough for tests
pub fn fast_config() -> TheatreConfig {
    TheatreConfig::default()
        .with_preload_delay(Duration::ZERO)
        .with_interaction_check(Duration::from_millis(10))
        .with_silence_timeout(Duration::from_millis(150))
}

pub struct Harness {
    pub handle: SessionHandle,
    pub mic: Microphone,
    pub gate: AutoplayGate,
    pub seen: Vec<SessionEvent>,
}

impl Harness {
    pub fn spawn(config: TheatreConfig, clip_length: Duration, gate: AutoplayGate) -> Self {
        Self::spawn_with(config, clip_length, gate, SyntheticSource::new())
    }

    pub fn spawn_with(
        config: TheatreConfig,
        clip_length: Duration,
        gate: AutoplayGate,
        source: SyntheticSource,
    ) -> Self {
        let (speech, mic) = ConsoleSpeech::new();
        Self::build(config, clip_length, gate, source, Box::new(speech), mic)
    }

    /// Run with a different recogniser; the returned microphone is never armed
    pub fn spawn_with_speech(
        config: TheatreConfig,
        clip_length: Duration,
        gate: AutoplayGate,
        speech: Box<dyn SpeechCapability>,
    ) -> Self {
        let (_, mic) = ConsoleSpeech::new();
        Self::build(config, clip_length, gate, SyntheticSource::new(), speech, mic)
    }

    fn build(
        config: TheatreConfig,
        clip_length: Duration,
        gate: AutoplayGate,
        source: SyntheticSource,
        speech: Box<dyn SpeechCapability>,
        mic: Microphone,
    ) -> Self {
        let slot = || Box::new(SimulatedSlot::new(clip_length).with_gate(gate.clone())) as Box<dyn VideoSlot>;
        let handle = Session::spawn(
            &config,
            SessionParts {
                media: Arc::new(source),
                speech,
                slots: [slot(), slot()],
            },
        )
        .expect("session should start");

        Self {
            handle,
            mic,
            gate,
            seen: Vec::new(),
        }
    }

    /// Collect events until `wanted` arrives; false on timeout
    pub fn wait_for(&mut self, wanted: SessionEvent) -> bool {
        let deadline = Instant::now() + WAIT;
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match self.handle.recv_event_timeout(remaining) {
                Some(event) => {
                    let found = event == wanted;
                    self.seen.push(event);
                    if found {
                        return true;
                    }
                }
                None => return false,
            }
        }
        false
    }

    /// States the conversation went through, from the events seen so far
    pub fn states(&self) -> Vec<ConversationState> {
        self.seen
            .iter()
            .filter_map(|event| match event {
                SessionEvent::StateChanged(state) => Some(*state),
                _ => None,
            })
            .collect()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.handle.shutdown();
    }
}
