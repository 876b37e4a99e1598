//! Session thread and the handle hosts use to drive it

use super::engine::{CoreSettings, SessionCore, FINAL_EVENT_WAIT};
use super::state::{SessionCommand, SessionEvent, SharedSessionState};
use crate::config::TheatreConfig;
use crate::conversation::Conversation;
use crate::media::{AssetCache, LoadOutcome, MediaSource};
use crate::playback::{DualBuffer, SlotEvent, VideoSlot};
use crate::speech::{RecognizerEvent, SpeechCapability, SpeechChannel};
use crate::{Result, TheatreError};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Longest the loop sleeps when no timer is armed
const IDLE_WAIT: Duration = Duration::from_millis(250);

/// Host capabilities a session is built from
pub struct SessionParts {
    /// Where clip bytes come from
    pub media: Arc<dyn MediaSource>,
    /// The platform recogniser, if any
    pub speech: Box<dyn SpeechCapability>,
    /// The two video surfaces
    pub slots: [Box<dyn VideoSlot>; 2],
}

/// A session ready to run on its own thread
pub struct Session {
    core: SessionCore<Box<dyn VideoSlot>>,
    command_rx: Receiver<SessionCommand>,
    load_rx: Receiver<LoadOutcome>,
    speech_rx: Receiver<RecognizerEvent>,
    slot_rx: Receiver<SlotEvent>,
    event_tx: Sender<SessionEvent>,
}

/// Host-side interface to a running session
pub struct SessionHandle {
    command_tx: Sender<SessionCommand>,
    event_rx: Receiver<SessionEvent>,
    state: SharedSessionState,
    thread: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl Session {
    /// Build a session from configuration and host parts
    pub fn new(config: &TheatreConfig, parts: SessionParts) -> Result<(Self, SessionHandle)> {
        config.validate()?;

        let buffer_size = config.session.channel_buffer_size;
        let (command_tx, command_rx) = bounded(buffer_size);
        let (event_tx, event_rx) = bounded(buffer_size);
        let (slot_tx, slot_rx) = unbounded();
        let state = SharedSessionState::new(config.session.history_limit);

        let cache = AssetCache::new(config.catalog()?, parts.media);
        let speech = SpeechChannel::new(parts.speech, config.recognition_settings());
        let [slot_a, slot_b] = parts.slots;
        let playback = DualBuffer::new(slot_a, slot_b, slot_tx);
        let load_rx = cache.outcomes();
        let speech_rx = speech.events();

        let core = SessionCore::new(
            Conversation::new(config.silence_policy()),
            cache,
            speech,
            playback,
            state.clone(),
            event_tx.clone(),
            CoreSettings::from(config),
        );

        let session = Self {
            core,
            command_rx,
            load_rx,
            speech_rx,
            slot_rx,
            event_tx,
        };
        let handle = SessionHandle {
            command_tx,
            event_rx,
            state,
            thread: None,
            shutdown_timeout: Duration::from_millis(config.session.shutdown_timeout_ms),
        };
        Ok((session, handle))
    }

    /// Build a session and start it on its own thread
    pub fn spawn(config: &TheatreConfig, parts: SessionParts) -> Result<SessionHandle> {
        let (session, mut handle) = Self::new(config, parts)?;
        handle.thread = Some(session.start()?);
        Ok(handle)
    }

    /// Run the event loop on a named thread
    pub fn start(self) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("theatre-session".to_string())
            .spawn(move || self.run())?;
        Ok(handle)
    }

    /// Run the event loop on the current thread until the session ends
    pub fn run(self) {
        let Session {
            mut core,
            command_rx,
            load_rx,
            speech_rx,
            slot_rx,
            event_tx,
        } = self;

        info!("Session loop starting");
        core.start(Instant::now());

        while !core.is_finished() {
            let timeout = core
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_WAIT)
                .min(IDLE_WAIT);

            select! {
                recv(command_rx) -> command => match command {
                    Ok(command) => {
                        debug!("Command: {:?}", command);
                        core.on_command(command, Instant::now());
                    }
                    Err(_) => {
                        warn!("Command channel disconnected, stopping session");
                        core.teardown();
                    }
                },

                recv(load_rx) -> outcome => {
                    if let Ok(outcome) = outcome {
                        core.on_load(outcome);
                    }
                }

                recv(speech_rx) -> event => {
                    if let Ok(event) = event {
                        core.on_speech(event, Instant::now());
                    }
                }

                recv(slot_rx) -> event => {
                    if let Ok(event) = event {
                        core.on_slot(event, Instant::now());
                    }
                }

                // Timers are checked below
                default(timeout) => {}
            }

            core.on_tick(Instant::now());
        }

        if event_tx.send_timeout(SessionEvent::Shutdown, FINAL_EVENT_WAIT).is_err() {
            debug!("Shutdown event not delivered");
        }
        info!("Session loop exiting");
    }
}

impl SessionHandle {
    /// Send a command to the session
    pub fn send_command(&self, command: SessionCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| TheatreError::ChannelError(format!("Failed to send command: {}", e)))
    }

    /// Ask to leave; the goodbye clip plays before the session ends
    pub fn exit(&self) -> Result<()> {
        self.send_command(SessionCommand::Exit)
    }

    /// Report a user gesture after playback was refused
    pub fn interact(&self) -> Result<()> {
        self.send_command(SessionCommand::Interact)
    }

    /// Stop the session now and wait for its thread
    pub fn shutdown(&mut self) -> Result<()> {
        if self.is_running() && self.send_command(SessionCommand::Shutdown).is_err() {
            debug!("Session already stopped");
        }

        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let deadline = Instant::now() + self.shutdown_timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                error!("Session thread did not stop within {:?}", self.shutdown_timeout);
                return Err(TheatreError::ChannelError(
                    "session shutdown timed out".to_string(),
                ));
            }
            thread::sleep(Duration::from_millis(5));
        }
        Self::join_thread(thread)
    }

    /// Wait for the session thread to finish on its own
    pub fn join(&mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => Self::join_thread(thread),
            None => Ok(()),
        }
    }

    fn join_thread(thread: JoinHandle<()>) -> Result<()> {
        thread
            .join()
            .map_err(|_| TheatreError::ChannelError("session thread panicked".to_string()))
    }

    /// True while the session thread is alive
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|thread| !thread.is_finished())
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Receiver for session events, for hosts that select on several channels
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.event_rx.clone()
    }

    /// Shared session state for direct queries
    pub fn state(&self) -> &SharedSessionState {
        &self.state
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.command_tx.try_send(SessionCommand::Shutdown);
        }
    }
}
