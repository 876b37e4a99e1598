//! Idempotent speech channel
//!
//! Wraps a [`SpeechCapability`] with start/stop calls that are safe to repeat
//! and turns raw recogniser events into [`SpeechEvent`]s. The recogniser is
//! opened lazily on the first `start`; if the host has none, the channel
//! logs it once and stays silent for the rest of the session.

use super::matcher::{match_utterance, normalize_transcript};
use super::recognizer::{
    RecognitionErrorCode, RecognitionSettings, Recognizer, RecognizerEvent, SpeechCapability,
};
use crate::conversation::ConversationState;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

/// What the conversation sees from one recognition turn
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Normalized text of a recognised utterance
    Transcript(String),
    /// The state the utterance maps to; always follows `Transcript`
    Match(ConversationState),
    /// The recogniser failed with a non-trivial error
    Error(RecognitionErrorCode),
}

enum Backend {
    Unopened,
    Ready(Box<dyn Recognizer>),
    Unavailable,
    Disposed,
}

/// Start/stop wrapper around the host recogniser
pub struct SpeechChannel {
    capability: Box<dyn SpeechCapability>,
    settings: RecognitionSettings,
    backend: Backend,
    listening: bool,
    events_tx: Sender<RecognizerEvent>,
    events_rx: Receiver<RecognizerEvent>,
}

impl SpeechChannel {
    pub fn new(capability: Box<dyn SpeechCapability>, settings: RecognitionSettings) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            capability,
            settings,
            backend: Backend::Unopened,
            listening: false,
            events_tx,
            events_rx,
        }
    }

    /// Receiver for raw recogniser events, to be selected on by the owner
    pub fn events(&self) -> Receiver<RecognizerEvent> {
        self.events_rx.clone()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// False once the host turned out to have no recogniser
    pub fn is_available(&self) -> bool {
        !matches!(self.backend, Backend::Unavailable)
    }

    /// Begin a recognition turn; no-op while already listening
    pub fn start(&mut self) {
        if self.listening {
            return;
        }

        if matches!(self.backend, Backend::Unopened) {
            match self.capability.open(&self.settings, self.events_tx.clone()) {
                Ok(recognizer) => {
                    info!("Speech recogniser ready ({})", self.settings.language);
                    self.backend = Backend::Ready(recognizer);
                }
                Err(e) => {
                    error!("Speech recognition not supported: {}", e);
                    self.backend = Backend::Unavailable;
                }
            }
        }

        let Backend::Ready(recognizer) = &mut self.backend else {
            return;
        };
        match recognizer.start() {
            Ok(()) => {
                debug!("Listening");
                self.listening = true;
            }
            Err(e) => error!("Error starting recognition: {}", e),
        }
    }

    /// End the current turn; no-op when not listening
    pub fn stop(&mut self) {
        if !self.listening {
            return;
        }
        let Backend::Ready(recognizer) = &mut self.backend else {
            self.listening = false;
            return;
        };
        match recognizer.stop() {
            Ok(()) => {
                debug!("Stopped listening");
                self.listening = false;
            }
            Err(e) => error!("Error stopping recognition: {}", e),
        }
    }

    /// Translate one raw recogniser event
    pub fn handle(&mut self, event: RecognizerEvent) -> Vec<SpeechEvent> {
        if matches!(self.backend, Backend::Disposed) {
            return Vec::new();
        }

        match event {
            RecognizerEvent::Result(raw) => {
                let text = normalize_transcript(&raw);
                let state = match_utterance(&text);
                debug!("Heard '{}' -> {}", text, state);
                vec![SpeechEvent::Transcript(text), SpeechEvent::Match(state)]
            }
            RecognizerEvent::Error(code) => {
                self.listening = false;
                if code.is_benign() {
                    debug!("Speech recognition ended: {}", code);
                    Vec::new()
                } else {
                    warn!("Speech recognition error: {}", code);
                    vec![SpeechEvent::Error(code)]
                }
            }
            RecognizerEvent::End => {
                self.listening = false;
                Vec::new()
            }
        }
    }

    /// Abort any turn in flight and detach from the recogniser
    pub fn dispose(&mut self) {
        if let Backend::Ready(recognizer) = &mut self.backend {
            recognizer.abort();
            debug!("Speech recogniser aborted");
        }
        self.backend = Backend::Disposed;
        self.listening = false;
        while self.events_rx.try_recv().is_ok() {}
    }
}

impl Drop for SpeechChannel {
    fn drop(&mut self) {
        self.dispose();
    }
}
