//! # Narration Orchestrator
//!
//! Per-panel state machine driving one narration from button press to
//! silence.
//!
//! ## States
//!
//! ```text
//!            toggle (cache miss)               script ready
//!   ┌──────┐ ──────────────────> ┌────────────┐ ───────────> ┌──────────────┐
//!   │ Idle │                     │ Requesting │              │ Synthesizing │
//!   └──────┘ <────────────┐      └────────────┘              └──────┬───────┘
//!      │  ▲   toggle, end,│                                           │ audio ready
//!      │  │   failure     │            ┌─────────┐                    │
//!      │  └───────────────┴────────────┤ Playing │ <──────────────────┘
//!      └──────────────────────────────>└─────────┘
//!            toggle (cache hit)
//! ```
//!
//! ## Staleness
//!
//! Every toggle bumps the orchestrator's token. A pipeline run captures the
//! token when it starts and checks it after each await; a mismatch means the
//! user cancelled (or restarted) meanwhile and the result is dropped. In-flight
//! service calls are never aborted.
//!
//! ## Supersession
//!
//! A session can be halted from outside the panel: another panel starts,
//! `stop_all`, or teardown. The controller reports that synchronously through
//! a [`HaltObserver`], so the halted panel is already `Idle` when the call that
//! halted it returns. The observer runs under the controller lock and then
//! takes the panel's control lock, so the orchestrator never calls into the
//! controller while holding its control lock.
//!
//! ## Publication
//!
//! The panel's [`NarrationSnapshot`] is published on a `tokio::sync::watch`
//! channel, and every transition is mirrored onto the [`EventBus`].

use crate::cache::{CacheWrite, NarrationCache};
use crate::decoder::PcmDecoder;
use crate::error::{FailureKind, NarrationError};
use crate::playback::{HaltObserver, PlaybackController, PlaybackEnd, SessionHandle, SessionId};
use crate::traits::{ScriptGeneration, SpeechSynthesis, Topic};
use core_runtime::events::{CoreEvent, EventBus, NarrationEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Public types
// ============================================================================

/// Narration lifecycle of a single panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrationState {
    Idle,
    Requesting,
    Synthesizing,
    Playing,
}

impl NarrationState {
    /// Status line shown next to the narration control.
    pub fn status(&self) -> &'static str {
        match self {
            NarrationState::Idle => "idle",
            NarrationState::Requesting => "Drafting Lesson…",
            NarrationState::Synthesizing => "Synthesizing Voice…",
            NarrationState::Playing => "Playing…",
        }
    }

    pub fn is_narrating(&self) -> bool {
        !matches!(self, NarrationState::Idle)
    }
}

impl fmt::Display for NarrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status())
    }
}

/// What a panel currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationSnapshot {
    pub state: NarrationState,
    pub status: String,
    pub is_narrating: bool,
    /// User-facing failure message, cleared automatically after a delay.
    pub error: Option<String>,
}

impl NarrationSnapshot {
    fn new(state: NarrationState, error: Option<String>) -> Self {
        Self {
            state,
            status: state.status().to_string(),
            is_narrating: state.is_narrating(),
            error,
        }
    }
}

impl Default for NarrationSnapshot {
    fn default() -> Self {
        Self::new(NarrationState::Idle, None)
    }
}

/// Result of [`NarrationOrchestrator::toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationOutcome {
    /// Audio is playing.
    Started { from_cache: bool },
    /// The panel's own playback was stopped.
    Stopped,
    /// A request in flight was abandoned; its result will be discarded.
    Cancelled,
    /// This run was overtaken by a later toggle and its result dropped.
    Discarded,
    /// The pipeline failed and the panel shows the classified message.
    Failed(FailureKind),
}

/// Components shared by every orchestrator.
#[derive(Clone)]
pub struct NarrationComponents {
    pub cache: Arc<NarrationCache>,
    pub generator: Arc<dyn ScriptGeneration>,
    pub synthesizer: Arc<dyn SpeechSynthesis>,
    pub decoder: PcmDecoder,
    pub playback: Arc<PlaybackController>,
    pub events: EventBus,
    /// How long a published error stays visible.
    pub error_clear_delay: Duration,
}

// ============================================================================
// Orchestrator
// ============================================================================

struct Control {
    state: NarrationState,
    /// A run is active but has not published a state yet (cache lookup).
    pending: bool,
    session: Option<SessionId>,
    error: Option<String>,
}

struct Shared {
    panel_id: String,
    topic: Topic,
    components: NarrationComponents,
    token: AtomicU64,
    error_token: AtomicU64,
    control: Mutex<Control>,
    snapshot: watch::Sender<NarrationSnapshot>,
}

/// Drives narration for one panel. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct NarrationOrchestrator {
    shared: Arc<Shared>,
}

impl NarrationOrchestrator {
    pub fn new(
        panel_id: impl Into<String>,
        topic: Topic,
        components: NarrationComponents,
    ) -> Self {
        let (snapshot, _) = watch::channel(NarrationSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                panel_id: panel_id.into(),
                topic,
                components,
                token: AtomicU64::new(0),
                error_token: AtomicU64::new(0),
                control: Mutex::new(Control {
                    state: NarrationState::Idle,
                    pending: false,
                    session: None,
                    error: None,
                }),
                snapshot,
            }),
        }
    }

    pub fn panel_id(&self) -> &str {
        &self.shared.panel_id
    }

    pub fn topic(&self) -> &Topic {
        &self.shared.topic
    }

    pub fn state(&self) -> NarrationState {
        self.shared.control.lock().state
    }

    pub fn snapshot(&self) -> NarrationSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Watch the panel's published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<NarrationSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Handle a press of the narration control.
    ///
    /// - idle: start narrating (from cache when possible)
    /// - requesting or synthesizing: abandon the request
    /// - playing: stop
    pub async fn toggle(&self) -> NarrationOutcome {
        let token = {
            let mut control = self.shared.control.lock();
            if control.state.is_narrating() || control.pending {
                None
            } else {
                control.pending = true;
                Some(self.shared.token.fetch_add(1, Ordering::SeqCst) + 1)
            }
        };

        match token {
            Some(token) => {
                self.shared.clear_error();
                self.run(token).await
            }
            None => self.stop().unwrap_or(NarrationOutcome::Cancelled),
        }
    }

    /// Stop or cancel whatever the panel is doing. Returns `None` when idle.
    pub fn stop(&self) -> Option<NarrationOutcome> {
        let shared = &self.shared;
        let (outcome, session) = {
            let mut control = shared.control.lock();
            let outcome = match control.state {
                NarrationState::Playing => NarrationOutcome::Stopped,
                NarrationState::Requesting | NarrationState::Synthesizing => {
                    NarrationOutcome::Cancelled
                }
                NarrationState::Idle if control.pending => NarrationOutcome::Cancelled,
                NarrationState::Idle => return None,
            };
            shared.token.fetch_add(1, Ordering::SeqCst);
            control.pending = false;
            let session = control.session.take();
            shared.transition(&mut control, NarrationState::Idle);
            (outcome, session)
        };

        if let Some(id) = session {
            shared.components.playback.stop_session(id);
        }

        match outcome {
            NarrationOutcome::Stopped => {
                info!(panel_id = %shared.panel_id, "Narration stopped");
                shared.emit(NarrationEvent::Stopped {
                    panel_id: shared.panel_id.clone(),
                });
            }
            _ => debug!(panel_id = %shared.panel_id, "Narration request abandoned"),
        }
        Some(outcome)
    }

    #[instrument(skip(self), fields(panel_id = %self.shared.panel_id))]
    async fn run(&self, token: u64) -> NarrationOutcome {
        let shared = &self.shared;
        let components = &shared.components;

        if let Some(previous) = components.playback.supersede() {
            shared.emit(NarrationEvent::Superseded {
                panel_id: previous,
                by_panel_id: shared.panel_id.clone(),
            });
        }

        let key = components.cache.key_for(&shared.topic.title);
        let cached = components.cache.get(&key).await;
        if !shared.is_current(token) {
            return NarrationOutcome::Discarded;
        }

        let (payload, from_cache) = match cached {
            Some(payload) => (payload, true),
            None => {
                if !shared.advance(token, NarrationState::Requesting) {
                    return NarrationOutcome::Discarded;
                }
                let script = match components.generator.generate(&shared.topic).await {
                    Ok(script) => script,
                    Err(e) => return shared.fail(token, e),
                };

                if !shared.advance(token, NarrationState::Synthesizing) {
                    return NarrationOutcome::Discarded;
                }
                let payload = match components.synthesizer.synthesize(&script).await {
                    Ok(payload) => payload,
                    Err(e) => return shared.fail(token, e),
                };
                if !shared.is_current(token) {
                    return NarrationOutcome::Discarded;
                }

                if let CacheWrite::Skipped { reason } = components.cache.set(&key, &payload).await {
                    shared.emit(NarrationEvent::CacheWriteSkipped {
                        cache_key: key.to_string(),
                        reason,
                    });
                }
                (payload, false)
            }
        };

        let buffer = match components.decoder.decode(&payload) {
            Ok(buffer) => buffer,
            Err(e) => return shared.fail(token, e),
        };
        if !shared.is_current(token) {
            return NarrationOutcome::Discarded;
        }

        let on_halt: HaltObserver = {
            let shared = Arc::downgrade(&self.shared);
            Box::new(move |session, end| {
                if let Some(shared) = shared.upgrade() {
                    shared.on_session_end(session, end);
                }
            })
        };
        let mut handle = match components
            .playback
            .play_observed(shared.panel_id.as_str(), buffer, on_halt)
            .await
        {
            Ok(handle) => handle,
            Err(e) => return shared.fail(token, e),
        };
        if let Some(previous) = handle.superseded() {
            shared.emit(NarrationEvent::Superseded {
                panel_id: previous.to_string(),
                by_panel_id: shared.panel_id.clone(),
            });
        }

        let session = handle.id();
        {
            let mut control = shared.control.lock();
            if !shared.is_current(token) {
                drop(control);
                components.playback.stop_session(session);
                return NarrationOutcome::Discarded;
            }
            if let Some(end) = handle.try_end() {
                debug!(panel_id = %shared.panel_id, session_id = %session, ?end, "Playback ended before it was published");
                control.pending = false;
                shared.transition(&mut control, NarrationState::Idle);
                return NarrationOutcome::Discarded;
            }
            control.pending = false;
            control.session = Some(session);
            shared.transition(&mut control, NarrationState::Playing);
        }

        info!(panel_id = %shared.panel_id, session_id = %session, from_cache, "Narration playing");
        shared.emit(NarrationEvent::Started {
            panel_id: shared.panel_id.clone(),
            title: shared.topic.title.clone(),
            from_cache,
        });
        self.watch_session(handle);

        NarrationOutcome::Started { from_cache }
    }

    fn watch_session(&self, handle: SessionHandle) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let session = handle.id();
            let end = handle.finished().await;
            shared.on_session_end(session, end);
        });
    }
}

impl fmt::Debug for NarrationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarrationOrchestrator")
            .field("panel_id", &self.shared.panel_id)
            .field("title", &self.shared.topic.title)
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    fn is_current(&self, token: u64) -> bool {
        self.token.load(Ordering::SeqCst) == token
    }

    /// Move to `state` if `token` is still current.
    fn advance(&self, token: u64, state: NarrationState) -> bool {
        let mut control = self.control.lock();
        if !self.is_current(token) {
            return false;
        }
        control.pending = false;
        self.transition(&mut control, state);
        true
    }

    fn transition(&self, control: &mut Control, state: NarrationState) {
        if control.state == state {
            return;
        }
        debug!(panel_id = %self.panel_id, from = ?control.state, to = ?state, "Narration state changed");
        control.state = state;
        self.publish(control);
        self.emit(NarrationEvent::StatusChanged {
            panel_id: self.panel_id.clone(),
            status: state.status().to_string(),
            is_narrating: state.is_narrating(),
        });
    }

    fn publish(&self, control: &Control) {
        self.snapshot
            .send_replace(NarrationSnapshot::new(control.state, control.error.clone()));
    }

    fn emit(&self, event: NarrationEvent) {
        self.components.events.emit(CoreEvent::Narration(event)).ok();
    }

    fn fail(self: &Arc<Self>, token: u64, error: NarrationError) -> NarrationOutcome {
        let kind = error.failure_kind();
        {
            let mut control = self.control.lock();
            if !self.is_current(token) {
                debug!(panel_id = %self.panel_id, error = %error, "Ignoring failure of stale request");
                return NarrationOutcome::Discarded;
            }
            warn!(panel_id = %self.panel_id, kind = kind.as_str(), error = %error, "Narration failed");
            control.pending = false;
            control.session = None;
            control.error = Some(kind.user_message().to_string());
            self.transition(&mut control, NarrationState::Idle);
            self.publish(&control);
        }

        self.emit(NarrationEvent::Failed {
            panel_id: self.panel_id.clone(),
            kind: kind.as_str().to_string(),
            message: kind.user_message().to_string(),
        });
        self.schedule_error_clear();
        NarrationOutcome::Failed(kind)
    }

    fn schedule_error_clear(self: &Arc<Self>) {
        let error_token = self.error_token.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.components.error_clear_delay;
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if shared.error_token.load(Ordering::SeqCst) == error_token {
                shared.clear_error();
            }
        });
    }

    fn clear_error(&self) {
        self.error_token.fetch_add(1, Ordering::SeqCst);
        let cleared = {
            let mut control = self.control.lock();
            let cleared = control.error.take().is_some();
            if cleared {
                self.publish(&control);
            }
            cleared
        };
        if cleared {
            debug!(panel_id = %self.panel_id, "Narration error cleared");
            self.emit(NarrationEvent::ErrorCleared {
                panel_id: self.panel_id.clone(),
            });
        }
    }

    fn on_session_end(&self, session: SessionId, end: PlaybackEnd) {
        {
            let mut control = self.control.lock();
            if control.session != Some(session) {
                return;
            }
            control.session = None;
            self.transition(&mut control, NarrationState::Idle);
        }

        match end {
            PlaybackEnd::Finished => {
                info!(panel_id = %self.panel_id, session_id = %session, "Narration completed");
                self.emit(NarrationEvent::Completed {
                    panel_id: self.panel_id.clone(),
                });
            }
            PlaybackEnd::Stopped => {
                info!(panel_id = %self.panel_id, session_id = %session, "Narration stopped externally");
                self.emit(NarrationEvent::Stopped {
                    panel_id: self.panel_id.clone(),
                });
            }
            PlaybackEnd::Superseded => {
                debug!(panel_id = %self.panel_id, session_id = %session, "Narration superseded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings() {
        assert_eq!(NarrationState::Idle.status(), "idle");
        assert_eq!(NarrationState::Requesting.status(), "Drafting Lesson…");
        assert_eq!(NarrationState::Synthesizing.status(), "Synthesizing Voice…");
        assert_eq!(NarrationState::Playing.status(), "Playing…");
    }

    #[test]
    fn only_idle_is_not_narrating() {
        assert!(!NarrationState::Idle.is_narrating());
        assert!(NarrationState::Requesting.is_narrating());
        assert!(NarrationState::Synthesizing.is_narrating());
        assert!(NarrationState::Playing.is_narrating());
    }

    #[test]
    fn default_snapshot_is_idle_without_error() {
        let snapshot = NarrationSnapshot::default();
        assert_eq!(snapshot.state, NarrationState::Idle);
        assert_eq!(snapshot.status, "idle");
        assert!(!snapshot.is_narrating);
        assert_eq!(snapshot.error, None);
    }
}
