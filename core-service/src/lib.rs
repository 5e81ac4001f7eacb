//! Narration service façade and bootstrap helpers.
//!
//! This crate wires a [`NarrationConfig`] (generative service credentials,
//! HTTP client, settings store, audio backend) into the shared narration
//! core. Desktop apps typically enable the `desktop-shims` feature so missing
//! bridges are filled in from `bridge-desktop`; `audio-output` additionally
//! opens the default sound device through rodio.
//!
//! ```ignore
//! use core_narration::Topic;
//! use core_runtime::config::NarrationConfig;
//! use core_service::NarrationService;
//!
//! let config = NarrationConfig::builder()
//!     .api_key_from_env("GEMINI_API_KEY")?
//!     .build()?;
//! let service = NarrationService::new(config)?;
//!
//! let panel = service.panel("doppler", Topic::new("Doppler Shift", "..."));
//! panel.toggle().await;
//! ```

pub mod error;
pub mod progress;

pub use error::{CoreError, Result};
pub use progress::{ProgressTracker, PROGRESS_KEY};

use core_narration::{
    AudioSynthesizer, CacheConfig, GeminiClient, NarrationCache, NarrationComponents,
    NarrationOrchestrator, PcmDecoder, PlaybackController, ScriptGenerator, Topic,
};
use core_runtime::config::NarrationConfig;
use core_runtime::events::{EventBus, EventStream};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

struct ServiceInner {
    components: NarrationComponents,
    progress: ProgressTracker,
    panels: Mutex<HashMap<String, NarrationOrchestrator>>,
}

/// Primary façade exposed to host applications.
///
/// Owns the components every panel shares (cache, service clients, the
/// playback controller and the event bus) and hands out one
/// [`NarrationOrchestrator`] per panel.
#[derive(Clone)]
pub struct NarrationService {
    inner: Arc<ServiceInner>,
}

impl NarrationService {
    /// Create a service from a validated configuration.
    pub fn new(config: NarrationConfig) -> Result<Self> {
        config.validate()?;

        let client = Arc::new(
            GeminiClient::new(
                config.http_client.clone(),
                config.api_key.clone(),
                config.api_base_url.clone(),
            )
            .with_timeout(config.request_timeout),
        );
        let cache = NarrationCache::new(
            config.settings_store.clone(),
            CacheConfig::new()
                .with_namespace(config.cache_namespace.clone())
                .with_memory_entries(config.memory_cache_entries),
        )?;
        let events = EventBus::new(config.event_buffer_size);

        let components = NarrationComponents {
            cache: Arc::new(cache),
            generator: Arc::new(ScriptGenerator::new(
                client.clone(),
                config.script_model.clone(),
            )),
            synthesizer: Arc::new(AudioSynthesizer::new(
                client,
                config.speech_model.clone(),
                config.voice_name.clone(),
            )),
            decoder: PcmDecoder::new(config.sample_rate, config.channels),
            playback: Arc::new(PlaybackController::new(config.audio_backend.clone())),
            events: events.clone(),
            error_clear_delay: config.error_clear_delay,
        };

        info!(
            script_model = %config.script_model,
            speech_model = %config.speech_model,
            voice = %config.voice_name,
            namespace = %config.cache_namespace,
            "Narration service ready"
        );

        Ok(Self::from_components(
            components,
            ProgressTracker::new(config.settings_store, events),
        ))
    }

    /// Assemble a service from pre-built components.
    pub fn from_components(components: NarrationComponents, progress: ProgressTracker) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                components,
                progress,
                panels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Orchestrator for `panel_id`.
    ///
    /// Repeat calls with the same topic return the same orchestrator. A new
    /// topic for an existing panel replaces its orchestrator, stopping the
    /// old one first.
    pub fn panel(&self, panel_id: &str, topic: Topic) -> NarrationOrchestrator {
        let mut panels = self.inner.panels.lock();
        if let Some(existing) = panels.get(panel_id) {
            if existing.topic() == &topic {
                return existing.clone();
            }
            debug!(panel_id, title = %topic.title, "Panel topic changed; replacing orchestrator");
            existing.stop();
        }

        let orchestrator =
            NarrationOrchestrator::new(panel_id, topic, self.inner.components.clone());
        panels.insert(panel_id.to_string(), orchestrator.clone());
        orchestrator
    }

    /// Stop narration on every panel. Returns how many were active.
    pub fn stop_all(&self) -> usize {
        let panels: Vec<NarrationOrchestrator> =
            self.inner.panels.lock().values().cloned().collect();
        let stopped = panels.iter().filter_map(|p| p.stop()).count();
        self.inner.components.playback.stop();
        if stopped > 0 {
            info!(stopped, "Stopped all narration");
        }
        stopped
    }

    /// Stream of every core event.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.inner.components.events.subscribe())
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.components.events
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.inner.progress
    }

    pub fn cache(&self) -> &NarrationCache {
        &self.inner.components.cache
    }

    pub fn playback(&self) -> Arc<PlaybackController> {
        Arc::clone(&self.inner.components.playback)
    }

    /// Stop everything and release the audio device. Panels keep working
    /// after [`PlaybackController::init`] is called again.
    pub async fn shutdown(&self) {
        self.stop_all();
        self.inner.components.playback.teardown().await;
        info!("Narration service shut down");
    }
}

impl std::fmt::Debug for NarrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrationService")
            .field("panels", &self.inner.panels.lock().len())
            .field("playback", &self.inner.components.playback)
            .finish()
    }
}
