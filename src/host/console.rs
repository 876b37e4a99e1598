//! Typed-text recogniser for terminal hosts
//!
//! [`ConsoleSpeech`] is a [`SpeechCapability`] whose "microphone" is a
//! [`Microphone`] handle: text handed to it becomes a recognition result,
//! but only while the session has the recogniser armed, like a real
//! one-utterance-per-turn recogniser.

use crate::speech::{
    RecognitionErrorCode, RecognitionSettings, Recognizer, RecognizerEvent, SpeechCapability,
};
use crate::Result;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct MicState {
    armed: bool,
    events: Option<Sender<RecognizerEvent>>,
}

/// Speech capability fed by a [`Microphone`]
pub struct ConsoleSpeech {
    mic: Arc<Mutex<MicState>>,
}

/// Host-side input for a [`ConsoleSpeech`]
#[derive(Clone)]
pub struct Microphone {
    mic: Arc<Mutex<MicState>>,
}

struct ConsoleRecognizer {
    mic: Arc<Mutex<MicState>>,
}

impl ConsoleSpeech {
    pub fn new() -> (Self, Microphone) {
        let mic = Arc::new(Mutex::new(MicState::default()));
        (Self { mic: mic.clone() }, Microphone { mic })
    }
}

impl SpeechCapability for ConsoleSpeech {
    fn open(
        &mut self,
        settings: &RecognitionSettings,
        events: Sender<RecognizerEvent>,
    ) -> Result<Box<dyn Recognizer>> {
        debug!("Console recogniser opened ({})", settings.language);
        self.mic.lock().events = Some(events);
        Ok(Box::new(ConsoleRecognizer {
            mic: self.mic.clone(),
        }))
    }
}

impl Recognizer for ConsoleRecognizer {
    fn start(&mut self) -> Result<()> {
        self.mic.lock().armed = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut mic = self.mic.lock();
        if mic.armed {
            mic.armed = false;
            if let Some(events) = &mic.events {
                let _ = events.send(RecognizerEvent::End);
            }
        }
        Ok(())
    }

    fn abort(&mut self) {
        let mut mic = self.mic.lock();
        mic.armed = false;
        mic.events = None;
    }
}

impl Microphone {
    /// True while the recogniser is waiting for an utterance
    pub fn is_armed(&self) -> bool {
        self.mic.lock().armed
    }

    /// Deliver an utterance; returns false if nobody was listening
    pub fn say(&self, text: &str) -> bool {
        self.finish_turn(RecognizerEvent::Result(text.to_string()))
    }

    /// End the current turn without speech
    pub fn silence(&self) -> bool {
        self.finish_turn(RecognizerEvent::Error(RecognitionErrorCode::NoSpeech))
    }

    /// End the current turn with a recogniser error
    pub fn fail(&self, code: RecognitionErrorCode) -> bool {
        self.finish_turn(RecognizerEvent::Error(code))
    }

    fn finish_turn(&self, event: RecognizerEvent) -> bool {
        let mut mic = self.mic.lock();
        if !mic.armed {
            return false;
        }
        let Some(events) = mic.events.clone() else {
            return false;
        };
        mic.armed = false;
        events.send(event).is_ok() && events.send(RecognizerEvent::End).is_ok()
    }
}
