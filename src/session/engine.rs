//! Synchronous session wiring
//!
//! [`SessionCore`] ties the conversation machine to the asset cache, the
//! speech channel and the dual-buffer controller. It has no thread and no
//! clock of its own: the runtime feeds it messages and the current
//! `Instant`, and asks `next_deadline` how long it may sleep.

use super::state::{SessionCommand, SessionEvent, SharedSessionState};
use crate::config::TheatreConfig;
use crate::conversation::{Conversation, ConversationState, Directive};
use crate::media::{AssetCache, LoadOutcome, LoadStatus};
use crate::playback::{DualBuffer, PlaybackSignal, PresentOutcome, SlotEvent, VideoSlot};
use crate::speech::{RecognizerEvent, SpeechChannel, SpeechEvent};
use crossbeam_channel::Sender;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How long a terminal event may wait for room in a full event channel
pub(crate) const FINAL_EVENT_WAIT: Duration = Duration::from_secs(1);

/// Timers and limits the core runs with
#[derive(Clone, Debug)]
pub struct CoreSettings {
    pub preload: Vec<ConversationState>,
    pub preload_delay: Duration,
    pub interaction_check: Duration,
    pub relisten: bool,
    pub relisten_limit: u32,
}

impl From<&TheatreConfig> for CoreSettings {
    fn from(config: &TheatreConfig) -> Self {
        Self {
            preload: config.session.preload.clone(),
            preload_delay: config.preload_delay(),
            interaction_check: config.interaction_check(),
            relisten: config.speech.relisten,
            relisten_limit: config.speech.relisten_limit,
        }
    }
}

pub struct SessionCore<S: VideoSlot> {
    conversation: Conversation,
    cache: AssetCache,
    speech: SpeechChannel,
    playback: DualBuffer<S>,
    state: SharedSessionState,
    events: Sender<SessionEvent>,
    settings: CoreSettings,
    /// State announced by the last `Present` directive
    last_state: ConversationState,
    preload_at: Option<Instant>,
    preloaded: bool,
    check_at: Option<Instant>,
    /// The visible clip ended since it was swapped in
    clip_done: bool,
    relistens: u32,
    torn_down: bool,
}

impl<S: VideoSlot> SessionCore<S> {
    pub fn new(
        conversation: Conversation,
        cache: AssetCache,
        speech: SpeechChannel,
        playback: DualBuffer<S>,
        state: SharedSessionState,
        events: Sender<SessionEvent>,
        settings: CoreSettings,
    ) -> Self {
        Self {
            conversation,
            cache,
            speech,
            playback,
            state,
            events,
            settings,
            last_state: ConversationState::Idle,
            preload_at: None,
            preloaded: false,
            check_at: None,
            clip_done: false,
            relistens: 0,
            torn_down: false,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub fn playback(&self) -> &DualBuffer<S> {
        &self.playback
    }

    pub fn speech(&self) -> &SpeechChannel {
        &self.speech
    }

    /// True once the session ended or was shut down
    pub fn is_finished(&self) -> bool {
        self.torn_down
    }

    /// Begin the conversation and schedule the clip preload
    pub fn start(&mut self, now: Instant) {
        info!("Session {} starting", self.state.id());
        self.preload_at = Some(now + self.settings.preload_delay);
        let directives = self.conversation.begin(now);
        self.apply(directives);
        self.on_tick(now);
    }

    /// Handle a host command; returns false once the session should stop
    pub fn on_command(&mut self, command: SessionCommand, now: Instant) -> bool {
        if self.torn_down {
            return false;
        }
        match command {
            SessionCommand::Exit => {
                let directives = self.conversation.exit(now);
                self.apply(directives);
            }
            SessionCommand::Interact => {
                self.state.write().interaction_required = false;
                match self.playback.resume_after_interaction(&self.cache) {
                    Some(outcome) => {
                        debug!("Resumed after interaction: {:?}", outcome);
                        self.after_present(self.conversation.state(), outcome);
                    }
                    None => debug!("Nothing to resume"),
                }
            }
            SessionCommand::Shutdown => {
                info!("Session shutdown requested");
                self.teardown();
            }
        }
        self.sync();
        !self.torn_down
    }

    /// Apply a finished clip load
    pub fn on_load(&mut self, outcome: LoadOutcome) {
        if self.torn_down {
            return;
        }
        let state = outcome.state;
        let status = self.cache.complete(outcome);
        self.sync();

        let current = self.conversation.state();
        if status == Some(LoadStatus::Ready)
            && state == current
            && self.playback.represented() != Some(current)
            && self.playback.in_flight() != Some(current)
        {
            debug!("Clip for current state {} arrived, presenting", current);
            self.present(current);
        }
    }

    /// Handle a raw recogniser event
    pub fn on_speech(&mut self, event: RecognizerEvent, now: Instant) {
        if self.torn_down {
            return;
        }
        let turn_over = matches!(event, RecognizerEvent::End);
        for speech_event in self.speech.handle(event) {
            match speech_event {
                SpeechEvent::Transcript(text) => {
                    if !self.conversation.state().is_listening() {
                        debug!("Dropping transcript outside listening");
                        continue;
                    }
                    self.conversation.on_transcript(&text);
                    self.emit(SessionEvent::Transcript(text));
                }
                SpeechEvent::Match(target) => {
                    let directives = self.conversation.on_match(target, now);
                    self.apply(directives);
                }
                SpeechEvent::Error(_) => {
                    let directives = self.conversation.on_speech_error(now);
                    self.apply(directives);
                }
            }
        }
        if turn_over {
            self.maybe_relisten();
        }
        self.sync();
    }

    /// Handle a slot notification
    pub fn on_slot(&mut self, event: SlotEvent, now: Instant) {
        if self.torn_down {
            return;
        }
        match self.playback.on_slot_event(event) {
            Some(PlaybackSignal::Presented { state, slot }) => {
                {
                    let mut shared = self.state.write();
                    shared.presented = Some(state);
                    shared.visible_slot = slot;
                    shared.interaction_required = false;
                }
                self.clip_done = false;
                self.check_at = Some(now + self.settings.interaction_check);
                self.emit(SessionEvent::Presented(state));
            }
            Some(PlaybackSignal::InteractionRequired { state }) => {
                warn!("Playback of {:?} needs user interaction", state);
                self.require_interaction();
            }
            Some(PlaybackSignal::ClipFinished(state)) => {
                self.clip_done = true;
                let directives = self.conversation.on_clip_finished(state, now);
                self.apply(directives);
            }
            None => {}
        }
        self.sync();
    }

    /// Fire every timer that is due at `now`
    pub fn on_tick(&mut self, now: Instant) {
        if self.torn_down {
            return;
        }

        if self.preload_at.is_some_and(|at| now >= at) {
            self.preload_at = None;
            self.preloaded = true;
            let started = self.cache.request(self.settings.preload.iter().copied());
            debug!("Preloading {} clip(s)", started.len());
            let current = self.conversation.state();
            if self.playback.represented() != Some(current) && !self.cache.is_loading(current) {
                self.present(current);
            }
        }

        if self.check_at.is_some_and(|at| now >= at) {
            self.check_at = None;
            if !self.clip_done && !self.playback.visible_is_playing() {
                warn!("Visible clip is not playing, autoplay was likely blocked");
                self.require_interaction();
            }
        }

        let directives = self.conversation.on_tick(now);
        self.apply(directives);
        self.sync();
    }

    /// Earliest pending timer
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.torn_down {
            return None;
        }
        [self.preload_at, self.check_at, self.conversation.silence_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    /// Release speech, cache and slots; safe to call more than once
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.preload_at = None;
        self.check_at = None;
        self.speech.dispose();
        self.cache.shutdown();
        self.playback.halt();
        self.state.write().listening = false;
        info!("Session {} torn down", self.state.id());
    }

    fn apply(&mut self, directives: Vec<Directive>) {
        for directive in directives {
            match directive {
                Directive::Present(next) => {
                    let previous = std::mem::replace(&mut self.last_state, next);
                    self.state.write().record_transition(previous, next);
                    self.sync();
                    self.emit(SessionEvent::StateChanged(next));
                    self.present(next);
                }
                Directive::StartListening => {
                    self.relistens = 0;
                    self.speech.start();
                }
                Directive::StopListening => self.speech.stop(),
                Directive::ClearTranscript => self.state.write().transcript.clear(),
                Directive::EndSession => {
                    self.teardown();
                    self.state.write().ended = true;
                    self.emit_final(SessionEvent::SessionEnded);
                }
            }
        }
        self.sync();
    }

    fn present(&mut self, target: ConversationState) {
        if self.torn_down {
            return;
        }
        let outcome = self.playback.present(target, &self.cache);
        self.after_present(target, outcome);
    }

    fn after_present(&mut self, target: ConversationState, outcome: PresentOutcome) {
        match outcome {
            PresentOutcome::Unavailable if self.preloaded => {
                // Load on demand; the load completion presents it
                if !self.cache.request([target]).is_empty() {
                    debug!("Loading {} on demand", target);
                }
            }
            PresentOutcome::Unchanged | PresentOutcome::Resumed(_) => {
                let mut shared = self.state.write();
                shared.presented = self.playback.represented();
            }
            _ => {}
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.events.try_send(event) {
            warn!("Dropping session event: {}", e);
        }
    }

    /// Like `emit`, but waits for the host to make room
    fn emit_final(&self, event: SessionEvent) {
        if let Err(e) = self.events.send_timeout(event, FINAL_EVENT_WAIT) {
            error!("Failed to deliver session event: {}", e);
        }
    }

    fn require_interaction(&mut self) {
        let mut shared = self.state.write();
        if !shared.interaction_required {
            shared.interaction_required = true;
            drop(shared);
            self.emit(SessionEvent::InteractionRequired);
        }
    }

    /// Restart recognition when a turn ended while still listening; the
    /// silence deadline is left alone
    fn maybe_relisten(&mut self) {
        if !self.settings.relisten
            || self.torn_down
            || self.speech.is_listening()
            || !self.speech.is_available()
            || !self.conversation.state().is_listening()
        {
            return;
        }
        if self.relistens >= self.settings.relisten_limit {
            debug!("Relisten limit reached, waiting for the silence timer");
            return;
        }
        self.relistens += 1;
        debug!("Restarting recognition ({}/{})", self.relistens, self.settings.relisten_limit);
        self.speech.start();
    }

    fn sync(&self) {
        let mut shared = self.state.write();
        shared.conversation = self.conversation.state();
        shared.silence_count = self.conversation.silence_count();
        shared.listening = !self.torn_down && self.speech.is_listening();
        if self.conversation.state().is_listening() {
            shared.transcript = self.conversation.transcript().to_string();
        }
        shared.visible_slot = self.playback.visible();
        shared.loading = self.cache.loading_states();
        shared.failed = self.cache.failed_states();
        shared.ended = shared.ended || self.conversation.is_ended();
    }
}

impl<S: VideoSlot> Drop for SessionCore<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
