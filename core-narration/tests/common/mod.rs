//! Shared fakes for narration integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bridge_desktop::MemorySettingsStore;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    AudioBackend, AudioContext, AudioSourceHandle, ContextState, EndedCallback, PcmBuffer,
    SettingsStore,
};
use core_narration::{
    CacheConfig, NarrationCache, NarrationComponents, NarrationError, NarrationOrchestrator,
    NarrationSnapshot, PcmDecoder, PlaybackController, ScriptGeneration, ServiceError,
    SpeechSynthesis, Topic,
};
use core_runtime::events::{CoreEvent, EventBus, NarrationEvent, Receiver};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify, Semaphore};

// ============================================================================
// Audio
// ============================================================================

/// Audio backend that plays nothing and lets tests end sources by hand.
#[derive(Default)]
pub struct FakeAudioBackend {
    start_suspended: bool,
    fail_create: AtomicBool,
    contexts_created: AtomicUsize,
    context: Mutex<Option<Arc<FakeContext>>>,
}

impl FakeAudioBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Contexts start suspended, as under a browser autoplay policy.
    pub fn suspended() -> Arc<Self> {
        Arc::new(Self {
            start_suspended: true,
            ..Self::default()
        })
    }

    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn contexts_created(&self) -> usize {
        self.contexts_created.load(Ordering::SeqCst)
    }

    pub fn context(&self) -> Option<Arc<FakeContext>> {
        self.context.lock().clone()
    }

    pub fn sources_started(&self) -> usize {
        self.context().map_or(0, |c| c.sources().len())
    }

    /// Fire the natural end of the most recent source. Returns `false` if its
    /// callback was already detached or fired.
    pub fn finish_latest(&self) -> bool {
        self.context()
            .and_then(|c| c.sources().last().cloned())
            .is_some_and(|s| s.finish())
    }
}

#[async_trait]
impl AudioBackend for FakeAudioBackend {
    async fn create_context(&self) -> BridgeResult<Arc<dyn AudioContext>> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(BridgeError::Audio("no output device".into()));
        }
        self.contexts_created.fetch_add(1, Ordering::SeqCst);
        let state = if self.start_suspended {
            ContextState::Suspended
        } else {
            ContextState::Running
        };
        let context = Arc::new(FakeContext {
            state: Mutex::new(state),
            resumes: AtomicUsize::new(0),
            sources: Mutex::new(Vec::new()),
        });
        *self.context.lock() = Some(context.clone());
        Ok(context)
    }
}

pub struct FakeContext {
    state: Mutex<ContextState>,
    resumes: AtomicUsize,
    sources: Mutex<Vec<Arc<FakeSource>>>,
}

impl FakeContext {
    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn sources(&self) -> Vec<Arc<FakeSource>> {
        self.sources.lock().clone()
    }

    pub fn suspend(&self) {
        *self.state.lock() = ContextState::Suspended;
    }
}

#[async_trait]
impl AudioContext for FakeContext {
    fn state(&self) -> ContextState {
        *self.state.lock()
    }

    async fn resume(&self) -> BridgeResult<()> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = ContextState::Running;
        Ok(())
    }

    fn start(
        &self,
        buffer: PcmBuffer,
        on_ended: EndedCallback,
    ) -> BridgeResult<Box<dyn AudioSourceHandle>> {
        if self.state() == ContextState::Closed {
            return Err(BridgeError::Audio("context closed".into()));
        }
        let source = Arc::new(FakeSource {
            frames: buffer.frames(),
            callback: Mutex::new(Some(on_ended)),
            stopped: AtomicBool::new(false),
        });
        self.sources.lock().push(source.clone());
        Ok(Box::new(FakeSourceHandle(source)))
    }

    async fn close(&self) -> BridgeResult<()> {
        *self.state.lock() = ContextState::Closed;
        Ok(())
    }
}

pub struct FakeSource {
    pub frames: usize,
    callback: Mutex<Option<EndedCallback>>,
    stopped: AtomicBool,
}

impl FakeSource {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn has_callback(&self) -> bool {
        self.callback.lock().is_some()
    }

    /// Simulate the audio reaching its end.
    pub fn finish(&self) -> bool {
        let callback = self.callback.lock().take();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

struct FakeSourceHandle(Arc<FakeSource>);

impl AudioSourceHandle for FakeSourceHandle {
    fn clear_on_ended(&mut self) {
        self.0.callback.lock().take();
    }

    fn stop(&mut self) {
        self.0.stopped.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Services
// ============================================================================

/// Holds a service call until the test releases it.
pub struct Gate {
    entered: Notify,
    release: Semaphore,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        })
    }

    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.release.add_permits(1);
    }

    async fn pass(&self) {
        self.entered.notify_one();
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
    }
}

/// Script generator with a fixed reply.
pub struct ScriptedGenerator {
    reply: std::result::Result<String, ServiceError>,
    calls: AtomicUsize,
    gate: Option<Arc<Gate>>,
}

impl ScriptedGenerator {
    pub fn ok(script: &str) -> Arc<Self> {
        Self::build(Ok(script.to_string()), None)
    }

    pub fn failing(error: ServiceError) -> Arc<Self> {
        Self::build(Err(error), None)
    }

    pub fn gated(script: &str, gate: Arc<Gate>) -> Arc<Self> {
        Self::build(Ok(script.to_string()), Some(gate))
    }

    fn build(reply: std::result::Result<String, ServiceError>, gate: Option<Arc<Gate>>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            gate,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptGeneration for ScriptedGenerator {
    async fn generate(&self, _topic: &Topic) -> core_narration::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        self.reply.clone().map_err(NarrationError::Generation)
    }
}

/// Speech synthesizer with a fixed reply.
pub struct ScriptedSynthesizer {
    reply: std::result::Result<String, ServiceError>,
    calls: AtomicUsize,
    scripts: Mutex<Vec<String>>,
    gate: Option<Arc<Gate>>,
}

impl ScriptedSynthesizer {
    pub fn ok(payload: &str) -> Arc<Self> {
        Self::build(Ok(payload.to_string()), None)
    }

    pub fn failing(error: ServiceError) -> Arc<Self> {
        Self::build(Err(error), None)
    }

    pub fn gated(payload: &str, gate: Arc<Gate>) -> Arc<Self> {
        Self::build(Ok(payload.to_string()), Some(gate))
    }

    fn build(reply: std::result::Result<String, ServiceError>, gate: Option<Arc<Gate>>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            scripts: Mutex::new(Vec::new()),
            gate,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }
}

#[async_trait]
impl SpeechSynthesis for ScriptedSynthesizer {
    async fn synthesize(&self, script: &str) -> core_narration::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.scripts.lock().push(script.to_string());
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        self.reply.clone().map_err(NarrationError::Synthesis)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub const SCRIPT: &str = "Imagine an ambulance racing past you on the street.";

/// Base64 of a short mono PCM16 clip.
pub fn pcm_payload(samples: &[i16]) -> String {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    STANDARD.encode(bytes)
}

pub fn sample_payload() -> String {
    pcm_payload(&[0, 8192, 16384, -16384, -8192, 0])
}

pub fn doppler() -> Topic {
    Topic::new(
        "Doppler Shift",
        "Why the pitch of a passing siren drops as it moves away.",
    )
}

pub struct Harness {
    pub store: Arc<dyn SettingsStore>,
    pub audio: Arc<FakeAudioBackend>,
    pub playback: Arc<PlaybackController>,
    pub cache: Arc<NarrationCache>,
    pub events: EventBus,
    pub generator: Arc<ScriptedGenerator>,
    pub synthesizer: Arc<ScriptedSynthesizer>,
}

impl Harness {
    pub fn new(generator: Arc<ScriptedGenerator>, synthesizer: Arc<ScriptedSynthesizer>) -> Self {
        Self::with_store(Arc::new(MemorySettingsStore::new()), generator, synthesizer)
    }

    pub fn with_store(
        store: Arc<dyn SettingsStore>,
        generator: Arc<ScriptedGenerator>,
        synthesizer: Arc<ScriptedSynthesizer>,
    ) -> Self {
        let audio = FakeAudioBackend::new();
        let cache = NarrationCache::new(store.clone(), CacheConfig::default().with_memory_entries(0))
            .expect("valid cache config");
        Self {
            store,
            playback: Arc::new(PlaybackController::new(audio.clone())),
            audio,
            cache: Arc::new(cache),
            events: EventBus::new(256),
            generator,
            synthesizer,
        }
    }

    /// Default happy-path harness.
    pub fn happy() -> Self {
        Self::new(
            ScriptedGenerator::ok(SCRIPT),
            ScriptedSynthesizer::ok(&sample_payload()),
        )
    }

    pub fn components(&self) -> NarrationComponents {
        NarrationComponents {
            cache: self.cache.clone(),
            generator: self.generator.clone(),
            synthesizer: self.synthesizer.clone(),
            decoder: PcmDecoder::default(),
            playback: self.playback.clone(),
            events: self.events.clone(),
            error_clear_delay: Duration::from_secs(5),
        }
    }

    pub fn panel(&self, panel_id: &str, topic: Topic) -> NarrationOrchestrator {
        NarrationOrchestrator::new(panel_id, topic, self.components())
    }
}

/// Drain every narration event received so far.
pub fn drain(rx: &mut Receiver<CoreEvent>) -> Vec<NarrationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Narration(event) = event {
            events.push(event);
        }
    }
    events
}

/// Status lines published for `panel_id`, in order.
pub fn statuses(events: &[NarrationEvent], panel_id: &str) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            NarrationEvent::StatusChanged {
                panel_id: p,
                status,
                ..
            } if p == panel_id => Some(status.clone()),
            _ => None,
        })
        .collect()
}

/// Wait until the snapshot satisfies `predicate`.
pub async fn wait_for(
    rx: &mut watch::Receiver<NarrationSnapshot>,
    predicate: impl FnMut(&NarrationSnapshot) -> bool,
) -> NarrationSnapshot {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("snapshot condition not reached in time")
        .expect("orchestrator dropped")
        .clone()
}
