//! Conversation states and the state machine that moves between them

pub mod machine;
pub mod state;

pub use machine::{Conversation, Directive, SilencePolicy};
pub use state::ConversationState;
