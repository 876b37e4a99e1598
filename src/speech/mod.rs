//! Speech channel over a host-supplied recogniser
//!
//! This module provides:
//! - The recogniser capability traits and raw events
//! - Keyword matching from utterance to conversational state
//! - The idempotent start/stop channel used by the session

pub mod channel;
pub mod matcher;
pub mod recognizer;

// Re-export commonly used types
pub use channel::{SpeechChannel, SpeechEvent};
pub use matcher::{match_utterance, normalize_transcript};
pub use recognizer::{
    NoSpeech, RecognitionErrorCode, RecognitionSettings, Recognizer, RecognizerEvent,
    SpeechCapability,
};
