//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the narration core and
//! platform-specific implementations. Each trait represents a capability that
//! the core requires but that must be implemented differently per platform
//! (desktop, web, tests).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Capacity-limited key-value storage
//!
//! ### Audio
//! - [`AudioBackend`](playback::AudioBackend) - Lazily created output contexts
//! - [`AudioContext`](playback::AudioContext) - Resume, start and close an output device
//! - [`AudioSourceHandle`](playback::AudioSourceHandle) - Detach and stop a started source
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | Tests    | in-crate fakes      | ✅ Available |
//!
//! ## Fail-Fast Strategy
//!
//! The core should fail fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! fn http_client(builder: &NarrationConfigBuilder) -> Result<Arc<dyn HttpClient>> {
//!     builder.http_client.clone().ok_or_else(|| Error::CapabilityMissing {
//!         capability: "HttpClient".to_string(),
//!         message: "No HTTP client implementation provided. \
//!                  Desktop: ensure the `desktop-shims` feature is enabled.".to_string(),
//!     })
//! }
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Report transport failures as `BridgeError::Network`
//! - Report capacity exhaustion as `BridgeError::QuotaExceeded`
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.

pub mod error;
pub mod http;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use playback::{
    AudioBackend, AudioContext, AudioSourceHandle, ContextState, EndedCallback, PcmBuffer,
};
pub use storage::SettingsStore;
