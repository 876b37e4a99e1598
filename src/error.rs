//! Error types for the Theatre core
//!
//! Every component absorbs its own failures and logs them. These errors only
//! cross a boundary as return values of trait implementations supplied by the
//! host (media sources, recognisers, video slots) and of configuration loading.

use crate::conversation::ConversationState;
use thiserror::Error;

/// Theatre errors
#[derive(Error, Debug, Clone)]
pub enum TheatreError {
    /// Fetching or decoding a clip failed
    #[error("Asset load error: {0}")]
    AssetLoadError(String),

    /// The catalog has no clip for the state
    #[error("No clip configured for state {0}")]
    MissingAsset(ConversationState),

    /// A video slot refused to attach or start a clip
    #[error("Playback error: {0}")]
    PlaybackError(String),

    /// The host has no speech recognition capability
    #[error("Speech recognition unavailable: {0}")]
    SpeechUnavailable(String),

    /// The recogniser rejected a start/stop request
    #[error("Speech recognition error: {0}")]
    RecognitionError(String),

    /// Channel communication error
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// File system I/O error
    #[error("IO error: {0}")]
    IOError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for TheatreError {
    fn from(e: std::io::Error) -> Self {
        TheatreError::IOError(e.to_string())
    }
}

impl TheatreError {
    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the session running; the conversation keeps
    /// going on the next transition that does not depend on the failed part.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Another state's clip may still be cached
            TheatreError::AssetLoadError(_) => true,
            TheatreError::MissingAsset(_) => false,
            // Autoplay refusals clear after user interaction
            TheatreError::PlaybackError(_) => true,
            // Silence timeout still moves the conversation along
            TheatreError::SpeechUnavailable(_) => true,
            TheatreError::RecognitionError(_) => true,
            TheatreError::ChannelError(_) => false,
            TheatreError::IOError(_) => false,
            TheatreError::ConfigError(_) => false,
        }
    }

    /// Get a user-friendly description of the error
    pub fn user_message(&self) -> String {
        match self {
            TheatreError::AssetLoadError(_) => {
                "A video clip failed to load.".to_string()
            }
            TheatreError::MissingAsset(state) => {
                format!("No video clip is configured for the {} state.", state)
            }
            TheatreError::PlaybackError(_) => {
                "Playback is blocked. Click anywhere to continue.".to_string()
            }
            TheatreError::SpeechUnavailable(_) => {
                "Speech recognition is not supported here.".to_string()
            }
            TheatreError::RecognitionError(_) => {
                "Speech recognition failed. Please try again.".to_string()
            }
            TheatreError::ChannelError(_) => {
                "Internal communication error. Please restart the session.".to_string()
            }
            TheatreError::IOError(_) => "File system error occurred.".to_string(),
            TheatreError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
        }
    }
}

/// Result type alias for Theatre operations
pub type Result<T> = std::result::Result<T, TheatreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(TheatreError::AssetLoadError("404".into()).is_recoverable());
        assert!(TheatreError::SpeechUnavailable("none".into()).is_recoverable());
        assert!(!TheatreError::ConfigError("bad".into()).is_recoverable());
        assert!(!TheatreError::MissingAsset(ConversationState::EasterEgg).is_recoverable());
    }

    #[test]
    fn test_missing_asset_message_names_state() {
        let err = TheatreError::MissingAsset(ConversationState::Weather);
        assert_eq!(err.to_string(), "No clip configured for state weather");
        assert!(err.user_message().contains("weather"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TheatreError = io.into();
        assert!(matches!(err, TheatreError::IOError(msg) if msg.contains("gone")));
    }
}
