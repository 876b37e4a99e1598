//! Clip cache keyed by conversational state
//!
//! `request` starts background loads; their results come back as
//! [`LoadOutcome`] messages on the cache's outcome channel and are applied by
//! the owner with `complete`. Only the owner mutates entries, so the session
//! thread stays the single writer while loads of different states overlap.

use super::{AssetCatalog, Locator, MediaSource, PlayableHandle};
use crate::conversation::ConversationState;
use crate::{Result, TheatreError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Load status of one state's clip
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadStatus {
    Pending,
    Ready,
    Failed,
}

#[derive(Debug)]
struct CacheEntry {
    status: LoadStatus,
    handle: Option<PlayableHandle>,
    attempt: u64,
}

/// Result of a background load, delivered to the cache owner
#[derive(Debug)]
pub struct LoadOutcome {
    pub state: ConversationState,
    pub attempt: u64,
    pub result: Result<PlayableHandle>,
}

/// Preloads and holds one clip per state
pub struct AssetCache {
    catalog: AssetCatalog,
    source: Arc<dyn MediaSource>,
    entries: HashMap<ConversationState, CacheEntry>,
    outcome_tx: Sender<LoadOutcome>,
    outcome_rx: Receiver<LoadOutcome>,
    detached: Arc<AtomicBool>,
    next_attempt: u64,
}

impl AssetCache {
    pub fn new(catalog: AssetCatalog, source: Arc<dyn MediaSource>) -> Self {
        let (outcome_tx, outcome_rx) = unbounded();
        Self {
            catalog,
            source,
            entries: HashMap::new(),
            outcome_tx,
            outcome_rx,
            detached: Arc::new(AtomicBool::new(false)),
            next_attempt: 0,
        }
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    /// Receiver for load outcomes, to be selected on by the owner
    pub fn outcomes(&self) -> Receiver<LoadOutcome> {
        self.outcome_rx.clone()
    }

    /// Start loading every state that is neither ready nor already loading
    ///
    /// Returns the states for which a new load was started. Failed states
    /// are retried.
    pub fn request<I>(&mut self, states: I) -> Vec<ConversationState>
    where
        I: IntoIterator<Item = ConversationState>,
    {
        let mut started = Vec::new();

        for state in states {
            match self.status(state) {
                Some(LoadStatus::Ready) | Some(LoadStatus::Pending) => continue,
                Some(LoadStatus::Failed) => debug!("Retrying failed clip for {}", state),
                None => {}
            }

            if self.detached.load(Ordering::Acquire) {
                warn!("Cache is shut down, not loading {}", state);
                break;
            }

            let Some(locator) = self.catalog.locator(state).cloned() else {
                error!("{}", TheatreError::MissingAsset(state));
                self.entries.insert(
                    state,
                    CacheEntry {
                        status: LoadStatus::Failed,
                        handle: None,
                        attempt: 0,
                    },
                );
                continue;
            };

            self.next_attempt += 1;
            let attempt = self.next_attempt;
            self.entries.insert(
                state,
                CacheEntry {
                    status: LoadStatus::Pending,
                    handle: None,
                    attempt,
                },
            );

            match self.spawn_load(state, locator, attempt) {
                Ok(()) => started.push(state),
                Err(e) => {
                    error!("Failed to start load for {}: {}", state, e);
                    self.mark_failed(state);
                }
            }
        }

        if !started.is_empty() {
            info!("Loading clips: {:?}", started);
        }
        started
    }

    fn spawn_load(&self, state: ConversationState, locator: Locator, attempt: u64) -> Result<()> {
        let source = Arc::clone(&self.source);
        let tx = self.outcome_tx.clone();
        let detached = Arc::clone(&self.detached);

        thread::Builder::new()
            .name(format!("theatre-load-{}", state))
            .spawn(move || {
                let result = source.load(&locator);
                // The owner is gone; drop the result rather than call into it
                if detached.load(Ordering::Acquire) {
                    debug!("Dropping {} load result after shutdown", state);
                    return;
                }
                let _ = tx.send(LoadOutcome {
                    state,
                    attempt,
                    result,
                });
            })
            .map(|_| ())
            .map_err(TheatreError::from)
    }

    /// Apply a load outcome; returns the new status when it changed an entry
    pub fn complete(&mut self, outcome: LoadOutcome) -> Option<LoadStatus> {
        let LoadOutcome {
            state,
            attempt,
            result,
        } = outcome;

        let entry = self.entries.get_mut(&state)?;
        if entry.status != LoadStatus::Pending || entry.attempt != attempt {
            debug!("Ignoring stale load result for {}", state);
            return None;
        }

        match result {
            Ok(handle) => {
                debug!("Clip ready for {} ({} bytes)", state, handle.len());
                entry.status = LoadStatus::Ready;
                entry.handle = Some(handle);
            }
            Err(e) => {
                error!("Failed to load clip for {}: {}", state, e);
                entry.status = LoadStatus::Failed;
                entry.handle = None;
            }
        }
        Some(entry.status)
    }

    fn mark_failed(&mut self, state: ConversationState) {
        if let Some(entry) = self.entries.get_mut(&state) {
            entry.status = LoadStatus::Failed;
            entry.handle = None;
        }
    }

    pub fn status(&self, state: ConversationState) -> Option<LoadStatus> {
        self.entries.get(&state).map(|entry| entry.status)
    }

    /// True while a load for the state is outstanding
    pub fn is_loading(&self, state: ConversationState) -> bool {
        self.status(state) == Some(LoadStatus::Pending)
    }

    /// The ready clip for a state, never blocks
    pub fn resolve(&self, state: ConversationState) -> Option<PlayableHandle> {
        self.entries
            .get(&state)
            .filter(|entry| entry.status == LoadStatus::Ready)
            .and_then(|entry| entry.handle.clone())
    }

    pub fn loading_states(&self) -> BTreeSet<ConversationState> {
        self.states_with(LoadStatus::Pending)
    }

    pub fn failed_states(&self) -> BTreeSet<ConversationState> {
        self.states_with(LoadStatus::Failed)
    }

    fn states_with(&self, status: LoadStatus) -> BTreeSet<ConversationState> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.status == status)
            .map(|(state, _)| *state)
            .collect()
    }

    /// Detach all in-flight loads; their results are discarded
    pub fn shutdown(&mut self) {
        if !self.detached.swap(true, Ordering::AcqRel) {
            let pending = self.loading_states();
            if !pending.is_empty() {
                debug!("Detaching in-flight loads: {:?}", pending);
            }
            while self.outcome_rx.try_recv().is_ok() {}
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }
}

impl Drop for AssetCache {
    fn drop(&mut self) {
        self.detached.store(true, Ordering::Release);
    }
}
