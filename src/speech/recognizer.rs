//! Speech recognition capability supplied by the host
//!
//! The host wraps its platform recogniser behind [`SpeechCapability`] and
//! [`Recognizer`]. Recognition results and errors flow back as
//! [`RecognizerEvent`]s on the sender handed over in `open`.

use crate::Result;
use crossbeam_channel::Sender;
use std::fmt;

/// Recogniser settings; one discrete utterance per turn
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecognitionSettings {
    /// BCP 47 language tag
    pub language: String,
    /// Keep recognising after the first result
    pub continuous: bool,
    /// Report partial results
    pub interim_results: bool,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            continuous: false,
            interim_results: false,
        }
    }
}

/// Error codes reported by a recogniser
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecognitionErrorCode {
    /// Nothing was said before the recogniser gave up
    NoSpeech,
    /// The turn was aborted by a stop/abort call
    Aborted,
    /// Microphone capture failed
    AudioCapture,
    /// The recognition service was unreachable
    Network,
    /// Microphone permission denied
    NotAllowed,
    /// The recognition service refused the request
    ServiceNotAllowed,
    BadGrammar,
    LanguageNotSupported,
    Other(String),
}

impl RecognitionErrorCode {
    /// Parse a Web Speech style error code
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "no-speech" => RecognitionErrorCode::NoSpeech,
            "aborted" => RecognitionErrorCode::Aborted,
            "audio-capture" => RecognitionErrorCode::AudioCapture,
            "network" => RecognitionErrorCode::Network,
            "not-allowed" => RecognitionErrorCode::NotAllowed,
            "service-not-allowed" => RecognitionErrorCode::ServiceNotAllowed,
            "bad-grammar" => RecognitionErrorCode::BadGrammar,
            "language-not-supported" => RecognitionErrorCode::LanguageNotSupported,
            other => RecognitionErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_code(&self) -> &str {
        match self {
            RecognitionErrorCode::NoSpeech => "no-speech",
            RecognitionErrorCode::Aborted => "aborted",
            RecognitionErrorCode::AudioCapture => "audio-capture",
            RecognitionErrorCode::Network => "network",
            RecognitionErrorCode::NotAllowed => "not-allowed",
            RecognitionErrorCode::ServiceNotAllowed => "service-not-allowed",
            RecognitionErrorCode::BadGrammar => "bad-grammar",
            RecognitionErrorCode::LanguageNotSupported => "language-not-supported",
            RecognitionErrorCode::Other(code) => code,
        }
    }

    /// Expected during normal listening and never surfaced
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            RecognitionErrorCode::NoSpeech | RecognitionErrorCode::Aborted
        )
    }
}

impl fmt::Display for RecognitionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Raw events from a recogniser
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// Best-guess transcript of one utterance
    Result(String),
    /// The turn failed
    Error(RecognitionErrorCode),
    /// The turn is over, with or without a result
    End,
}

/// A live recognition session
pub trait Recognizer: Send {
    /// Begin one recognition turn
    fn start(&mut self) -> Result<()>;

    /// Stop listening and deliver any pending result
    fn stop(&mut self) -> Result<()>;

    /// Stop listening and discard any pending result
    fn abort(&mut self);
}

/// Factory for recognisers; absent on platforms without speech recognition
pub trait SpeechCapability: Send {
    /// Construct a recogniser that reports on `events`
    ///
    /// Returns `TheatreError::SpeechUnavailable` when the platform has no
    /// recogniser.
    fn open(
        &mut self,
        settings: &RecognitionSettings,
        events: Sender<RecognizerEvent>,
    ) -> Result<Box<dyn Recognizer>>;
}

/// Capability for hosts without any speech recognition
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSpeech;

impl SpeechCapability for NoSpeech {
    fn open(
        &mut self,
        _settings: &RecognitionSettings,
        _events: Sender<RecognizerEvent>,
    ) -> Result<Box<dyn Recognizer>> {
        Err(crate::TheatreError::SpeechUnavailable(
            "no recogniser on this host".to_string(),
        ))
    }
}
