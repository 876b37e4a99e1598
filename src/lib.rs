//! Theatre - voice-driven avatar core
//!
//! Plays one pre-rendered clip per conversational state while a speech
//! recogniser drives the conversation forward. The host owns the video
//! surfaces and the platform recogniser; this crate owns the state machine,
//! the clip cache, the speech channel and the dual-buffer playback controller.

pub mod config;
pub mod conversation;
pub mod error;
pub mod host;
pub mod media;
pub mod playback;
pub mod session;
pub mod speech;

#[cfg(test)]
pub(crate) mod fakes;

pub use config::TheatreConfig;
pub use conversation::{Conversation, ConversationState, Directive};
pub use error::{Result, TheatreError};
pub use media::{AssetCache, AssetCatalog, FileMediaSource, Locator, MediaSource, PlayableHandle};
pub use playback::{DualBuffer, PlayTicket, PlaybackSignal, SlotEvent, SlotId, VideoSlot};
pub use session::{
    Session, SessionCommand, SessionEvent, SessionHandle, SessionParts, SessionState,
    SharedSessionState,
};
pub use speech::{
    match_utterance, RecognitionErrorCode, Recognizer, RecognizerEvent, SpeechCapability,
    SpeechChannel, SpeechEvent,
};
