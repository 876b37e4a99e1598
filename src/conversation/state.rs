//! Conversational states
//!
//! Each state is bound to exactly one clip in the asset catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The logical phase of the interaction
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Before a session begins
    #[default]
    Idle,
    /// Opening clip
    Greeting,
    /// Waiting for the user to speak
    Listening,
    /// Response to a weather question
    Weather,
    /// Catch-all response
    General,
    /// Closing clip, ends the session when it finishes
    Goodbye,
    /// Recovery clip after a recognition error
    Fallback,
    /// Nudge after the first silent listening window
    Prompt,
    /// Hidden response, only present when the catalog provides a clip
    EasterEgg,
}

impl ConversationState {
    /// Every state, in declaration order
    pub const ALL: [ConversationState; 9] = [
        ConversationState::Idle,
        ConversationState::Greeting,
        ConversationState::Listening,
        ConversationState::Weather,
        ConversationState::General,
        ConversationState::Goodbye,
        ConversationState::Fallback,
        ConversationState::Prompt,
        ConversationState::EasterEgg,
    ];

    /// States whose clip hands control back to listening when it finishes
    pub fn returns_to_listening(&self) -> bool {
        matches!(
            self,
            ConversationState::Greeting
                | ConversationState::Weather
                | ConversationState::General
                | ConversationState::Fallback
                | ConversationState::Prompt
                | ConversationState::EasterEgg
        )
    }

    /// Check if this is the listening state
    pub fn is_listening(&self) -> bool {
        matches!(self, ConversationState::Listening)
    }

    /// Check if this is the goodbye state
    pub fn is_goodbye(&self) -> bool {
        matches!(self, ConversationState::Goodbye)
    }

    /// Snake-case name used in configuration files and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::Greeting => "greeting",
            ConversationState::Listening => "listening",
            ConversationState::Weather => "weather",
            ConversationState::General => "general",
            ConversationState::Goodbye => "goodbye",
            ConversationState::Fallback => "fallback",
            ConversationState::Prompt => "prompt",
            ConversationState::EasterEgg => "easter_egg",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ConversationState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| format!("unknown conversation state '{}'", s))
    }
}
