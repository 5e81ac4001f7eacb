//! Playback controller
//!
//! The controller serializes access to the output device. All session state
//! lives behind one `parking_lot::Mutex` that is never held across an
//! `.await`: async work (creating and resuming the context) happens first,
//! then the lock is taken once to stop the old source and start the new one.

use crate::error::{NarrationError, Result};
use bridge_traits::{AudioBackend, AudioContext, AudioSourceHandle, ContextState, PcmBuffer};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Identity of a playback session. Strictly increasing per controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The audio played to its natural end.
    Finished,
    /// Stopped by `stop`, `stop_session` or `teardown`.
    Stopped,
    /// Cut off because another session started.
    Superseded,
}

/// Called under the controller lock when a session is halted early
/// (superseded, stopped or torn down). It must not call back into the
/// controller.
pub type HaltObserver = Box<dyn FnOnce(SessionId, PlaybackEnd) + Send + 'static>;

/// Handle returned by [`PlaybackController::play`].
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    owner: String,
    superseded: Option<String>,
    completion: oneshot::Receiver<PlaybackEnd>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Owner of the session this one cut off, if any.
    pub fn superseded(&self) -> Option<&str> {
        self.superseded.as_deref()
    }

    /// The end of the session if it has already ended.
    ///
    /// Once this returns `Some`, [`finished`](Self::finished) must not be
    /// awaited.
    pub fn try_end(&mut self) -> Option<PlaybackEnd> {
        match self.completion.try_recv() {
            Ok(end) => Some(end),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(PlaybackEnd::Stopped),
        }
    }

    /// Wait for the session to end.
    ///
    /// Resolves exactly once. If the controller is dropped first the session
    /// is reported as [`PlaybackEnd::Stopped`].
    pub async fn finished(self) -> PlaybackEnd {
        self.completion.await.unwrap_or(PlaybackEnd::Stopped)
    }
}

struct ActiveSession {
    id: SessionId,
    owner: String,
    source: Box<dyn AudioSourceHandle>,
    completion: Option<oneshot::Sender<PlaybackEnd>>,
    on_halt: Option<HaltObserver>,
}

impl ActiveSession {
    /// Detach the end callback, halt the source, then notify the owner.
    fn halt(mut self, end: PlaybackEnd) -> String {
        self.source.clear_on_ended();
        self.source.stop();
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(end);
        }
        if let Some(observer) = self.on_halt.take() {
            observer(self.id, end);
        }
        self.owner
    }
}

#[derive(Default)]
struct Inner {
    context: Option<Arc<dyn AudioContext>>,
    active: Option<ActiveSession>,
    torn_down: bool,
}

/// Shared owner of the output context and the active session.
///
/// Create one per process and inject it into every orchestrator.
pub struct PlaybackController {
    backend: Arc<dyn AudioBackend>,
    inner: Arc<Mutex<Inner>>,
    next_id: AtomicU64,
}

impl PlaybackController {
    /// Create a controller. The output context is not opened until the first
    /// call to [`play`](Self::play).
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            inner: Arc::new(Mutex::new(Inner::default())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Re-enable playback after [`teardown`](Self::teardown). Idempotent.
    pub fn init(&self) {
        let mut inner = self.inner.lock();
        if inner.torn_down {
            debug!("Playback controller re-initialized");
        }
        inner.torn_down = false;
    }

    pub fn is_initialized(&self) -> bool {
        !self.inner.lock().torn_down
    }

    /// Play `buffer` on behalf of `owner`, ending any active session first.
    ///
    /// # Errors
    ///
    /// - [`NarrationError::TornDown`] after `teardown` until the next `init`
    /// - [`NarrationError::Playback`] if the context cannot be opened, resumed
    ///   or started
    pub async fn play(&self, owner: impl Into<String>, buffer: PcmBuffer) -> Result<SessionHandle> {
        self.start_session(owner.into(), buffer, None).await
    }

    /// Like [`play`](Self::play), and `on_halt` runs synchronously if the
    /// session is later superseded, stopped or torn down. A natural end is
    /// reported only through the handle.
    pub async fn play_observed(
        &self,
        owner: impl Into<String>,
        buffer: PcmBuffer,
        on_halt: HaltObserver,
    ) -> Result<SessionHandle> {
        self.start_session(owner.into(), buffer, Some(on_halt)).await
    }

    async fn start_session(
        &self,
        owner: String,
        buffer: PcmBuffer,
        on_halt: Option<HaltObserver>,
    ) -> Result<SessionHandle> {
        let context = self.ready_context().await?;

        let id = SessionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        let on_ended = {
            let inner = Arc::downgrade(&self.inner);
            Box::new(move || Self::on_natural_end(&inner, id))
        };

        let mut inner = self.inner.lock();
        if inner.torn_down {
            return Err(NarrationError::TornDown);
        }

        let superseded = inner.active.take().map(|previous| {
            let previous_id = previous.id;
            let previous_owner = previous.halt(PlaybackEnd::Superseded);
            info!(
                session_id = %previous_id,
                owner = %previous_owner,
                by = %owner,
                "Playback superseded"
            );
            previous_owner
        });

        let frames = buffer.frames();
        let source = context
            .start(buffer, on_ended)
            .map_err(|e| NarrationError::Playback(e.to_string()))?;

        debug!(session_id = %id, owner = %owner, frames, "Playback started");
        inner.active = Some(ActiveSession {
            id,
            owner: owner.clone(),
            source,
            completion: Some(tx),
            on_halt,
        });

        Ok(SessionHandle {
            id,
            owner,
            superseded,
            completion: rx,
        })
    }

    /// Stop whatever is playing. Returns the owner of the stopped session.
    pub fn stop(&self) -> Option<String> {
        self.end_active(PlaybackEnd::Stopped, |_| true)
    }

    /// Stop the active session on behalf of another owner. Its completion
    /// resolves to [`PlaybackEnd::Superseded`].
    pub fn supersede(&self) -> Option<String> {
        self.end_active(PlaybackEnd::Superseded, |_| true)
    }

    /// Stop the session `id` if it is still the active one.
    pub fn stop_session(&self, id: SessionId) -> bool {
        self.end_active(PlaybackEnd::Stopped, |active| active.id == id)
            .is_some()
    }

    pub fn active_owner(&self) -> Option<String> {
        self.inner.lock().active.as_ref().map(|a| a.owner.clone())
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.inner.lock().active.as_ref().map(|a| a.id)
    }

    /// Stop playback and release the output context.
    pub async fn teardown(&self) {
        let context = {
            let mut inner = self.inner.lock();
            inner.torn_down = true;
            if let Some(active) = inner.active.take() {
                active.halt(PlaybackEnd::Stopped);
            }
            inner.context.take()
        };

        if let Some(context) = context {
            if let Err(e) = context.close().await {
                warn!(error = %e, "Failed to close audio context");
            }
        }
        info!("Playback controller torn down");
    }

    fn end_active(
        &self,
        end: PlaybackEnd,
        matches: impl FnOnce(&ActiveSession) -> bool,
    ) -> Option<String> {
        let mut inner = self.inner.lock();
        if !inner.active.as_ref().is_some_and(matches) {
            return None;
        }
        let active = inner.active.take()?;
        let id = active.id;
        let owner = active.halt(end);
        debug!(session_id = %id, owner = %owner, ?end, "Playback ended early");
        Some(owner)
    }

    /// Return a running context, creating or resuming it as needed.
    async fn ready_context(&self) -> Result<Arc<dyn AudioContext>> {
        let existing = {
            let mut inner = self.inner.lock();
            if inner.torn_down {
                return Err(NarrationError::TornDown);
            }
            if inner
                .context
                .as_ref()
                .is_some_and(|c| c.state() == ContextState::Closed)
            {
                debug!("Audio context was closed; reopening");
                inner.context = None;
            }
            inner.context.clone()
        };

        let context = match existing {
            Some(context) => context,
            None => {
                let created = self
                    .backend
                    .create_context()
                    .await
                    .map_err(|e| NarrationError::Playback(e.to_string()))?;

                let mut inner = self.inner.lock();
                if inner.torn_down {
                    return Err(NarrationError::TornDown);
                }
                // A concurrent play may have opened one while we awaited.
                inner.context.get_or_insert(created).clone()
            }
        };

        if context.state() == ContextState::Suspended {
            debug!("Resuming suspended audio context");
            context
                .resume()
                .await
                .map_err(|e| NarrationError::Playback(e.to_string()))?;
        }

        Ok(context)
    }

    fn on_natural_end(inner: &Weak<Mutex<Inner>>, id: SessionId) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut inner = inner.lock();
        if inner.active.as_ref().map(|a| a.id) != Some(id) {
            debug!(session_id = %id, "Ignoring end of stale session");
            return;
        }
        if let Some(mut active) = inner.active.take() {
            debug!(session_id = %id, owner = %active.owner, "Playback finished");
            if let Some(tx) = active.completion.take() {
                let _ = tx.send(PlaybackEnd::Finished);
            }
        }
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("PlaybackController")
            .field("has_context", &inner.context.is_some())
            .field("active_session", &inner.active.as_ref().map(|a| a.id))
            .field("torn_down", &inner.torn_down)
            .finish()
    }
}
