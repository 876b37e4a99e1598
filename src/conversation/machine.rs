//! Conversation state machine
//!
//! Owns the current state, the silence counter and the silence deadline.
//! Inputs come from the speech channel, the playback controller and the
//! session clock; outputs are [`Directive`]s the session carries out.
//! Time is always passed in, the machine never reads the clock itself.

use super::ConversationState;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Silence handling while listening
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SilencePolicy {
    /// How long a listening window stays open without a match
    pub timeout: Duration,
    /// Consecutive silent windows answered with a prompt before giving up
    pub max_prompts: u32,
}

impl Default for SilencePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_prompts: 1,
        }
    }
}

/// Work the session must carry out after a transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Show the clip for this state
    Present(ConversationState),
    /// Start the speech channel
    StartListening,
    /// Stop the speech channel
    StopListening,
    /// The transcript was cleared
    ClearTranscript,
    /// Goodbye finished, hand control back to the host
    EndSession,
}

/// The conversation state machine
#[derive(Debug)]
pub struct Conversation {
    state: ConversationState,
    policy: SilencePolicy,
    silence_count: u32,
    silence_deadline: Option<Instant>,
    transcript: String,
    ended: bool,
}

impl Conversation {
    /// Create a machine in the pre-session state
    pub fn new(policy: SilencePolicy) -> Self {
        Self {
            state: ConversationState::Idle,
            policy,
            silence_count: 0,
            silence_deadline: None,
            transcript: String::new(),
            ended: false,
        }
    }

    /// Current state
    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// Consecutive silent listening windows since the last match
    pub fn silence_count(&self) -> u32 {
        self.silence_count
    }

    /// When the armed silence timer fires, if any
    pub fn silence_deadline(&self) -> Option<Instant> {
        self.silence_deadline
    }

    /// Last recognised text in the current listening window
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Check if the session has ended
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Silence policy in effect
    pub fn policy(&self) -> SilencePolicy {
        self.policy
    }

    /// Start a session: counters reset and the greeting plays
    pub fn begin(&mut self, now: Instant) -> Vec<Directive> {
        self.silence_count = 0;
        self.silence_deadline = None;
        self.transcript.clear();
        self.ended = false;
        self.state = ConversationState::Idle;
        info!("Conversation starting");
        self.transition(ConversationState::Greeting, now)
    }

    /// The visible clip for `represented` finished playing
    pub fn on_clip_finished(&mut self, represented: ConversationState, now: Instant) -> Vec<Directive> {
        if self.ended {
            return Vec::new();
        }
        if represented != self.state {
            debug!(
                "Ignoring end of {} clip, conversation already at {}",
                represented, self.state
            );
            return Vec::new();
        }

        if represented.returns_to_listening() {
            self.transition(ConversationState::Listening, now)
        } else if represented.is_goodbye() {
            info!("Goodbye clip finished, ending session");
            self.ended = true;
            vec![Directive::EndSession]
        } else {
            Vec::new()
        }
    }

    /// Record recognised text; only kept while listening
    pub fn on_transcript(&mut self, text: &str) {
        if self.ended || !self.state.is_listening() {
            return;
        }
        self.transcript = text.to_string();
    }

    /// The speech channel matched an utterance to a state
    pub fn on_match(&mut self, target: ConversationState, now: Instant) -> Vec<Directive> {
        if self.ended || !self.state.is_listening() {
            debug!("Ignoring match {} outside listening", target);
            return Vec::new();
        }
        self.silence_deadline = None;
        self.silence_count = 0;
        self.transition(target, now)
    }

    /// The recogniser reported a non-trivial error
    pub fn on_speech_error(&mut self, now: Instant) -> Vec<Directive> {
        if self.ended || !self.state.is_listening() {
            return Vec::new();
        }
        self.transition(ConversationState::Fallback, now)
    }

    /// Advance the clock; fires the silence timer when due
    pub fn on_tick(&mut self, now: Instant) -> Vec<Directive> {
        if self.ended || !self.state.is_listening() {
            return Vec::new();
        }
        match self.silence_deadline {
            Some(deadline) if now >= deadline => {}
            _ => return Vec::new(),
        }

        self.silence_deadline = None;
        if self.silence_count >= self.policy.max_prompts {
            info!("Still silent after {} prompt(s), saying goodbye", self.silence_count);
            self.transition(ConversationState::Goodbye, now)
        } else {
            self.silence_count += 1;
            debug!("Silence timeout, prompting (count {})", self.silence_count);
            self.transition(ConversationState::Prompt, now)
        }
    }

    /// The user asked to leave
    pub fn exit(&mut self, now: Instant) -> Vec<Directive> {
        if self.ended || self.state.is_goodbye() {
            return Vec::new();
        }
        info!("Exit requested from {}", self.state);
        self.transition(ConversationState::Goodbye, now)
    }

    fn transition(&mut self, next: ConversationState, now: Instant) -> Vec<Directive> {
        let mut directives = Vec::new();
        let previous = self.state;

        if previous.is_listening() {
            self.silence_deadline = None;
            directives.push(Directive::StopListening);
        }

        self.state = next;
        debug!("Conversation {} -> {}", previous, next);

        if next.is_listening() {
            self.transcript.clear();
            self.silence_deadline = Some(now + self.policy.timeout);
            directives.push(Directive::ClearTranscript);
            directives.push(Directive::StartListening);
        }

        directives.push(Directive::Present(next));
        directives
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(SilencePolicy::default())
    }
}
