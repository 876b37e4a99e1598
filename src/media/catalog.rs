//! Static mapping from conversational state to clip locator

use crate::conversation::ConversationState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where a clip lives, relative to the media source's root
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator(String);

impl Locator {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Immutable state → locator table, fixed when the session is built
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetCatalog {
    clips: BTreeMap<ConversationState, Locator>,
}

impl AssetCatalog {
    pub fn new(clips: impl IntoIterator<Item = (ConversationState, Locator)>) -> Self {
        Self {
            clips: clips.into_iter().collect(),
        }
    }

    /// Locator for a state, if the state has a clip
    pub fn locator(&self, state: ConversationState) -> Option<&Locator> {
        self.clips.get(&state)
    }

    pub fn contains(&self, state: ConversationState) -> bool {
        self.clips.contains_key(&state)
    }

    /// States with a clip, in state order
    pub fn states(&self) -> impl Iterator<Item = ConversationState> + '_ {
        self.clips.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl Default for AssetCatalog {
    fn default() -> Self {
        use ConversationState::*;
        Self::new([
            (Greeting, Locator::new("greeting.mp4")),
            (Listening, Locator::new("listening.mp4")),
            (Weather, Locator::new("weather.mp4")),
            (General, Locator::new("general.mp4")),
            (Goodbye, Locator::new("goodbye.mp4")),
            (Fallback, Locator::new("fallback.mp4")),
            (Prompt, Locator::new("prompt.mp4")),
        ])
    }
}
