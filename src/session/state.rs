//! Shared session state
//!
//! The session thread is the only writer. Hosts read it through
//! [`SharedSessionState`], either field by field or as a cloned snapshot,
//! and listen for [`SessionEvent`]s to know when to look again.

use crate::conversation::ConversationState;
use crate::playback::SlotId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

/// Commands a host can send to a running session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    /// The user asked to leave; plays the goodbye clip first
    Exit,
    /// The user interacted after playback was refused
    Interact,
    /// Stop immediately without a goodbye
    Shutdown,
}

/// Notifications emitted by a running session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The conversation moved to a new state
    StateChanged(ConversationState),
    /// An utterance was recognised
    Transcript(String),
    /// A state's clip is now on screen
    Presented(ConversationState),
    /// Playback needs a user gesture before it can start
    InteractionRequired,
    /// The goodbye clip finished; the host should leave the session view
    SessionEnded,
    /// The session thread stopped
    Shutdown,
}

/// One conversation transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransitionRecord {
    pub from: ConversationState,
    pub to: ConversationState,
    pub at: DateTime<Utc>,
}

/// Everything a host may want to show about a session
#[derive(Clone, Debug, Serialize)]
pub struct SessionState {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Current conversation state
    pub conversation: ConversationState,
    /// State whose clip is on screen
    pub presented: Option<ConversationState>,
    pub visible_slot: SlotId,
    /// Last recognised text in the current listening window
    pub transcript: String,
    pub silence_count: u32,
    pub listening: bool,
    /// States whose clips are still loading
    pub loading: BTreeSet<ConversationState>,
    /// States whose clips failed to load
    pub failed: BTreeSet<ConversationState>,
    pub interaction_required: bool,
    pub ended: bool,
    /// Most recent transitions, oldest first
    pub history: VecDeque<TransitionRecord>,
    #[serde(skip)]
    history_limit: usize,
}

impl SessionState {
    pub fn new(history_limit: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            conversation: ConversationState::Idle,
            presented: None,
            visible_slot: SlotId::A,
            transcript: String::new(),
            silence_count: 0,
            listening: false,
            loading: BTreeSet::new(),
            failed: BTreeSet::new(),
            interaction_required: false,
            ended: false,
            history: VecDeque::new(),
            history_limit,
        }
    }

    /// Record a transition, dropping the oldest entries past the limit
    pub fn record_transition(&mut self, from: ConversationState, to: ConversationState) {
        self.conversation = to;
        if self.history_limit == 0 {
            return;
        }
        while self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(TransitionRecord {
            from,
            to,
            at: Utc::now(),
        });
    }

    /// States visited so far, in order
    pub fn path(&self) -> Vec<ConversationState> {
        self.history.iter().map(|record| record.to).collect()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(50)
    }
}

/// Thread-safe handle on the session state
#[derive(Clone, Default)]
pub struct SharedSessionState {
    inner: Arc<RwLock<SessionState>>,
}

impl SharedSessionState {
    pub fn new(history_limit: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionState::new(history_limit))),
        }
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, SessionState> {
        self.inner.read()
    }

    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, SessionState> {
        self.inner.write()
    }

    /// Clone of the current state; no lock is held after return
    pub fn snapshot(&self) -> SessionState {
        self.inner.read().clone()
    }

    pub fn id(&self) -> Uuid {
        self.inner.read().id
    }

    pub fn conversation(&self) -> ConversationState {
        self.inner.read().conversation
    }

    pub fn presented(&self) -> Option<ConversationState> {
        self.inner.read().presented
    }

    pub fn transcript(&self) -> String {
        self.inner.read().transcript.clone()
    }

    pub fn is_listening(&self) -> bool {
        self.inner.read().listening
    }

    pub fn is_ended(&self) -> bool {
        self.inner.read().ended
    }

    pub fn interaction_required(&self) -> bool {
        self.inner.read().interaction_required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConversationState::*;

    #[test]
    fn test_history_is_bounded() {
        let mut state = SessionState::new(2);
        state.record_transition(Idle, Greeting);
        state.record_transition(Greeting, Listening);
        state.record_transition(Listening, Weather);

        assert_eq!(state.conversation, Weather);
        assert_eq!(state.path(), vec![Listening, Weather]);
        assert_eq!(state.history[0].from, Greeting);
    }

    #[test]
    fn test_shared_state_snapshot() {
        let shared = SharedSessionState::new(10);
        {
            let mut state = shared.write();
            state.record_transition(Idle, Greeting);
            state.loading.insert(Listening);
        }

        let snapshot = shared.snapshot();
        shared.write().ended = true;

        assert_eq!(snapshot.conversation, Greeting);
        assert!(!snapshot.ended);
        assert!(shared.is_ended());
        assert_eq!(shared.conversation(), Greeting);
    }

    #[test]
    fn test_snapshot_serializes() {
        let shared = SharedSessionState::new(10);
        shared.write().record_transition(Idle, Greeting);
        shared.write().failed.insert(EasterEgg);

        let json = serde_json::to_value(shared.snapshot()).unwrap();
        assert_eq!(json["conversation"], "greeting");
        assert_eq!(json["failed"][0], "easter_egg");
        assert_eq!(json["visible_slot"], "A");
        assert_eq!(json["history"][0]["to"], "greeting");
        assert!(json.get("history_limit").is_none());
    }
}
