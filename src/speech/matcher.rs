//! Keyword matching from utterance to conversational state

use crate::conversation::ConversationState;

/// Keyword rules in priority order; the first rule with a hit wins
const KEYWORD_RULES: &[(&[&str], ConversationState)] = &[
    (&["weather", "today"], ConversationState::Weather),
    (&["bye", "goodbye"], ConversationState::Goodbye),
    (&["hello", "hi"], ConversationState::Greeting),
];

/// Lowercase and trim a raw recogniser transcript
pub fn normalize_transcript(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Map an utterance to the state that answers it
///
/// Keywords match as substrings of the normalized text, so "this" counts
/// as "hi". Anything without a keyword is `General`.
pub fn match_utterance(text: &str) -> ConversationState {
    let text = normalize_transcript(text);
    KEYWORD_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
        .map(|(_, state)| *state)
        .unwrap_or(ConversationState::General)
}
