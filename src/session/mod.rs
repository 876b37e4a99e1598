//! Session runtime
//!
//! A session owns one conversation from greeting to goodbye:
//! - **SessionCore**: synchronous wiring of machine, cache, speech and playback
//! - **Session**: the event-loop thread feeding the core
//! - **SessionHandle**: commands, events and shared state for the host

pub mod engine;
pub mod runtime;
pub mod state;

pub use engine::{CoreSettings, SessionCore};
pub use runtime::{Session, SessionHandle, SessionParts};
pub use state::{SessionCommand, SessionEvent, SessionState, SharedSessionState, TransitionRecord};
