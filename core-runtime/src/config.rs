//! # Narration Configuration Module
//!
//! Provides configuration management for the narration core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `NarrationConfig` instance that holds all necessary dependencies and
//! settings. It enforces fail-fast validation so every required bridge is
//! present before any narration is attempted.
//!
//! ## Required Dependencies
//!
//! - API key for the generative service
//! - `HttpClient` - service calls (desktop default: reqwest)
//! - `SettingsStore` - narration cache and learner progress (desktop default: SQLite)
//! - `AudioBackend` - speaker output (desktop default: rodio, `audio-output` feature)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults are
//! injected for any bridge that was not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::NarrationConfig;
//! use std::sync::Arc;
//!
//! let config = NarrationConfig::builder()
//!     .api_key_from_env("GEMINI_API_KEY")?
//!     .settings_store(Arc::new(MySettingsStore))
//!     .audio_backend(Arc::new(MyAudioBackend))
//!     .voice_name("Kore")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::redact_if_sensitive;
use bridge_traits::{AudioBackend, HttpClient, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Public endpoint of the generative language service.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Model used to draft lecture scripts.
pub const DEFAULT_SCRIPT_MODEL: &str = "gemini-2.5-flash";
/// Model used to synthesize speech.
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
/// Prebuilt narrator voice.
pub const DEFAULT_VOICE_NAME: &str = "Kore";
/// Output rate of the speech model.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
/// Speech output is mono.
pub const DEFAULT_CHANNELS: u16 = 1;
/// Versioned cache namespace. Bump the version to force regeneration.
pub const DEFAULT_CACHE_NAMESPACE: &str = "physics_narrationCache_v1";
/// How long a published error stays visible.
pub const DEFAULT_ERROR_CLEAR_DELAY: Duration = Duration::from_secs(5);
/// Per-request timeout for service calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Capacity of the default persistent store, matching a browser origin's
/// local storage allowance.
pub const DEFAULT_STORE_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// Narration core configuration.
///
/// Use [`NarrationConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct NarrationConfig {
    /// Key sent with every service request
    pub api_key: String,

    /// Base URL of the generative service
    pub api_base_url: String,

    /// Model that drafts lecture scripts
    pub script_model: String,

    /// Model that synthesizes speech
    pub speech_model: String,

    /// Prebuilt voice used for every narration
    pub voice_name: String,

    /// Sample rate of the synthesized PCM
    pub sample_rate: u32,

    /// Channel count of the synthesized PCM
    pub channels: u16,

    /// Versioned prefix for cache keys
    pub cache_namespace: String,

    /// Number of recently played payloads kept in memory in front of the store
    pub memory_cache_entries: usize,

    /// Delay before a published error is cleared
    pub error_clear_delay: Duration,

    /// Per-request timeout for service calls
    pub request_timeout: Duration,

    /// Capacity of the event bus
    pub event_buffer_size: usize,

    /// HTTP client for service calls
    pub http_client: Arc<dyn HttpClient>,

    /// Persistent key-value store for cache entries and progress
    pub settings_store: Arc<dyn SettingsStore>,

    /// Audio output
    pub audio_backend: Arc<dyn AudioBackend>,
}

impl std::fmt::Debug for NarrationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrationConfig")
            .field("api_key", &redact_if_sensitive("api_key", &self.api_key))
            .field("api_base_url", &self.api_base_url)
            .field("script_model", &self.script_model)
            .field("speech_model", &self.speech_model)
            .field("voice_name", &self.voice_name)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("cache_namespace", &self.cache_namespace)
            .field("memory_cache_entries", &self.memory_cache_entries)
            .field("error_clear_delay", &self.error_clear_delay)
            .field("request_timeout", &self.request_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("audio_backend", &"AudioBackend { ... }")
            .finish()
    }
}

impl NarrationConfig {
    /// Creates a new builder for constructing a `NarrationConfig`.
    pub fn builder() -> NarrationConfigBuilder {
        NarrationConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - API key, base URL, models, voice and namespace are not blank
    /// - Audio format is mono or stereo at a non-zero rate
    /// - Timers and buffers are non-zero
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("API key cannot be empty".to_string()));
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "API base URL must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }

        for (name, value) in [
            ("Script model", &self.script_model),
            ("Speech model", &self.speech_model),
            ("Voice name", &self.voice_name),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} cannot be empty", name)));
            }
        }

        if self.cache_namespace.is_empty()
            || !self
                .cache_namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::Config(
                "Cache namespace must be non-empty and contain only ASCII letters, digits or '_'"
                    .to_string(),
            ));
        }

        if self.sample_rate == 0 {
            return Err(Error::Config(
                "Sample rate must be greater than 0 Hz".to_string(),
            ));
        }

        if !(1..=2).contains(&self.channels) {
            return Err(Error::Config(format!(
                "Channel count must be 1 or 2, got {}",
                self.channels
            )));
        }

        if self.error_clear_delay.is_zero() {
            return Err(Error::Config(
                "Error clear delay must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the script and speech services. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Web: inject a fetch-based client."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for the narration cache. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default SqliteSettingsStore. \
                 Web: inject a localStorage-based settings store."
            .to_string(),
    }
}

#[cfg(not(feature = "audio-output"))]
fn audio_backend_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioBackend".to_string(),
        message: "AudioBackend implementation is required to play narration. \
                 Desktop: enable the 'audio-output' feature to use the default RodioAudioBackend. \
                 Web: inject a WebAudio-based backend."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to initialize default HttpClient: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(
    data_dir: Option<PathBuf>,
    quota_bytes: u64,
) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Handle, Runtime};

    let path = data_dir
        .unwrap_or_else(bridge_desktop::default_data_dir)
        .join("narration.db");

    let init_store = move |path: PathBuf| -> Result<_> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default settings store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map(|store| store.with_quota(quota_bytes))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // Blocking on a runtime from inside another runtime panics, so hop to a
    // plain thread when called from async code.
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(
    _data_dir: Option<PathBuf>,
    _quota_bytes: u64,
) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

#[cfg(feature = "audio-output")]
fn provide_default_audio_backend() -> Result<Arc<dyn AudioBackend>> {
    let backend: Arc<dyn AudioBackend> = Arc::new(bridge_desktop::RodioAudioBackend::new());
    Ok(backend)
}

#[cfg(not(feature = "audio-output"))]
fn provide_default_audio_backend() -> Result<Arc<dyn AudioBackend>> {
    Err(audio_backend_missing_error())
}

/// Builder for constructing [`NarrationConfig`] instances.
///
/// Unset values fall back to the `DEFAULT_*` constants of this module.
/// Unset bridges fall back to the desktop implementations when the
/// corresponding feature is enabled.
#[derive(Default)]
pub struct NarrationConfigBuilder {
    api_key: Option<String>,
    api_base_url: Option<String>,
    script_model: Option<String>,
    speech_model: Option<String>,
    voice_name: Option<String>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
    cache_namespace: Option<String>,
    memory_cache_entries: Option<usize>,
    error_clear_delay: Option<Duration>,
    request_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
    data_dir: Option<PathBuf>,
    store_quota_bytes: Option<u64>,
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    audio_backend: Option<Arc<dyn AudioBackend>>,
}

impl NarrationConfigBuilder {
    /// Sets the service API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Reads the service API key from an environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the variable is unset or not valid UTF-8.
    pub fn api_key_from_env(self, var: &str) -> Result<Self> {
        let key = std::env::var(var).map_err(|e| {
            Error::Config(format!(
                "API key environment variable '{}' is not usable: {}",
                var, e
            ))
        })?;
        Ok(self.api_key(key))
    }

    /// Sets the service base URL (useful for proxies and tests).
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn script_model(mut self, model: impl Into<String>) -> Self {
        self.script_model = Some(model.into());
        self
    }

    pub fn speech_model(mut self, model: impl Into<String>) -> Self {
        self.speech_model = Some(model.into());
        self
    }

    /// Sets the prebuilt narrator voice.
    ///
    /// Default: `Kore`
    pub fn voice_name(mut self, voice: impl Into<String>) -> Self {
        self.voice_name = Some(voice.into());
        self
    }

    /// Sets the PCM sample rate the speech service produces.
    ///
    /// Default: 24000 Hz
    pub fn sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate = Some(hz);
        self
    }

    /// Sets the PCM channel count the speech service produces.
    ///
    /// Default: 1 (mono)
    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Sets the cache key namespace.
    ///
    /// Default: `physics_narrationCache_v1`
    pub fn cache_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.cache_namespace = Some(namespace.into());
        self
    }

    /// Sets how many payloads are memoized in memory. `0` disables the layer.
    ///
    /// Default: 8
    pub fn memory_cache_entries(mut self, entries: usize) -> Self {
        self.memory_cache_entries = Some(entries);
        self
    }

    /// Sets how long an error stays published before it is cleared.
    ///
    /// Default: 5 seconds
    pub fn error_clear_delay(mut self, delay: Duration) -> Self {
        self.error_clear_delay = Some(delay);
        self
    }

    /// Sets the timeout applied to each service request.
    ///
    /// Default: 60 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the directory holding the default SQLite store.
    ///
    /// Only consulted when no settings store is injected.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the byte quota of the default SQLite store.
    ///
    /// Default: 5 MiB
    pub fn store_quota_bytes(mut self, bytes: u64) -> Self {
        self.store_quota_bytes = Some(bytes);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn audio_backend(mut self, backend: Arc<dyn AudioBackend>) -> Self {
        self.audio_backend = Some(backend);
        self
    }

    /// Builds the final `NarrationConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns an error if:
    /// - The API key is missing
    /// - A bridge is missing and no desktop default is available
    /// - Configuration values are invalid
    pub fn build(self) -> Result<NarrationConfig> {
        let api_key = self.api_key.ok_or_else(|| {
            Error::Config(
                "API key is required. Use .api_key() or .api_key_from_env() to set it.".to_string(),
            )
        })?;

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(
                self.data_dir,
                self.store_quota_bytes.unwrap_or(DEFAULT_STORE_QUOTA_BYTES),
            )?,
        };

        let audio_backend = match self.audio_backend {
            Some(backend) => backend,
            None => provide_default_audio_backend()?,
        };

        let config = NarrationConfig {
            api_key,
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            script_model: self
                .script_model
                .unwrap_or_else(|| DEFAULT_SCRIPT_MODEL.to_string()),
            speech_model: self
                .speech_model
                .unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string()),
            voice_name: self
                .voice_name
                .unwrap_or_else(|| DEFAULT_VOICE_NAME.to_string()),
            sample_rate: self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            channels: self.channels.unwrap_or(DEFAULT_CHANNELS),
            cache_namespace: self
                .cache_namespace
                .unwrap_or_else(|| DEFAULT_CACHE_NAMESPACE.to_string()),
            memory_cache_entries: self.memory_cache_entries.unwrap_or(8),
            error_clear_delay: self.error_clear_delay.unwrap_or(DEFAULT_ERROR_CLEAR_DELAY),
            request_timeout,
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
            settings_store,
            audio_backend,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{AudioContext, HttpRequest, HttpResponse};

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            unimplemented!("not exercised by config tests")
        }
    }

    struct MockSettingsStore;

    #[async_trait]
    impl SettingsStore for MockSettingsStore {
        async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }

        async fn delete(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }

        async fn has_key(&self, _key: &str) -> BridgeResult<bool> {
            Ok(false)
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn clear_all(&self) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct MockAudioBackend;

    #[async_trait]
    impl AudioBackend for MockAudioBackend {
        async fn create_context(&self) -> BridgeResult<Arc<dyn AudioContext>> {
            unimplemented!("not exercised by config tests")
        }
    }

    fn complete_builder() -> NarrationConfigBuilder {
        NarrationConfig::builder()
            .api_key("test-key")
            .http_client(Arc::new(MockHttpClient))
            .settings_store(Arc::new(MockSettingsStore))
            .audio_backend(Arc::new(MockAudioBackend))
    }

    #[test]
    fn test_builder_applies_defaults() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.script_model, "gemini-2.5-flash");
        assert_eq!(config.speech_model, "gemini-2.5-flash-preview-tts");
        assert_eq!(config.voice_name, "Kore");
        assert_eq!(config.sample_rate, 24_000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.cache_namespace, "physics_narrationCache_v1");
        assert_eq!(config.error_clear_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_requires_api_key() {
        let result = NarrationConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .settings_store(Arc::new(MockSettingsStore))
            .audio_backend(Arc::new(MockAudioBackend))
            .build();

        assert!(result.unwrap_err().to_string().contains("API key is required"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_settings_store() {
        let result = NarrationConfig::builder()
            .api_key("k")
            .http_client(Arc::new(MockHttpClient))
            .audio_backend(Arc::new(MockAudioBackend))
            .build();

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("SettingsStore"));
        assert!(err_msg.contains("narration cache"));
    }

    #[cfg(not(feature = "audio-output"))]
    #[test]
    fn test_builder_requires_audio_backend() {
        let result = NarrationConfig::builder()
            .api_key("k")
            .http_client(Arc::new(MockHttpClient))
            .settings_store(Arc::new(MockSettingsStore))
            .build();

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("AudioBackend"));
        assert!(err_msg.contains("audio-output"));
    }

    #[test]
    fn test_validate_rejects_blank_key() {
        let result = complete_builder().api_key("   ").build();
        assert!(result.unwrap_err().to_string().contains("API key cannot be empty"));
    }

    #[test]
    fn test_validate_rejects_bad_namespace() {
        let result = complete_builder().cache_namespace("physics cache/v2").build();
        assert!(result.unwrap_err().to_string().contains("Cache namespace"));
    }

    #[test]
    fn test_validate_rejects_bad_audio_format() {
        assert!(complete_builder().sample_rate(0).build().is_err());
        assert!(complete_builder().channels(0).build().is_err());
        assert!(complete_builder().channels(6).build().is_err());
        assert!(complete_builder().channels(2).build().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_http_base_url() {
        let result = complete_builder().api_base_url("ftp://example.com").build();
        assert!(result.unwrap_err().to_string().contains("http(s)"));
    }

    #[test]
    fn test_validate_rejects_zero_timers() {
        assert!(complete_builder()
            .error_clear_delay(Duration::ZERO)
            .build()
            .is_err());
        assert!(complete_builder()
            .request_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = complete_builder().api_key("AIzaSySecret").build().unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("AIzaSySecret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_api_key_from_env() {
        std::env::set_var("NARRATION_CONFIG_TEST_KEY", "from-env");
        let config = complete_builder()
            .api_key_from_env("NARRATION_CONFIG_TEST_KEY")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.api_key, "from-env");

        assert!(NarrationConfig::builder()
            .api_key_from_env("NARRATION_CONFIG_TEST_KEY_UNSET")
            .is_err());
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_store() {
        let dir = std::env::temp_dir().join(format!(
            "core-runtime-test-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));

        let config = NarrationConfig::builder()
            .api_key("k")
            .data_dir(&dir)
            .audio_backend(Arc::new(MockAudioBackend))
            .build()
            .expect("desktop defaults should succeed");

        let settings = config.settings_store.clone();
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            settings.set_string("ns_DopplerShift", "AAAA").await.unwrap();
            let value = settings.get_string("ns_DopplerShift").await.unwrap();
            assert_eq!(value.as_deref(), Some("AAAA"));
        });

        drop(config);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
