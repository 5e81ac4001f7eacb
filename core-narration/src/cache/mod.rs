//! # Narration Cache
//!
//! Best-effort persistence of synthesized narration audio.
//!
//! ## Overview
//!
//! Synthesized audio is stored as its base64 payload under a [`CacheKey`]
//! derived from the topic title, so a topic is generated at most once per
//! installation. The persistent [`SettingsStore`] may be full or unavailable;
//! neither case is ever an error for the caller:
//! - a failed read is a miss
//! - a failed write is reported as [`CacheWrite::Skipped`] and logged
//!
//! Recently used payloads are also kept in a small in-memory LRU so replays
//! within a session skip the store. Entries never expire; bumping the
//! namespace is the only invalidation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let cache = NarrationCache::new(store, CacheConfig::default())?;
//! let key = cache.key_for("Doppler Shift");
//! if cache.get(&key).await.is_none() {
//!     cache.set(&key, &payload).await;
//! }
//! ```

pub mod config;
pub mod key;

pub use config::CacheConfig;
pub use key::{sanitize_title, CacheKey};

use crate::error::{NarrationError, Result};
use bridge_traits::{BridgeError, SettingsStore};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of [`NarrationCache::set`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWrite {
    /// The payload was persisted.
    Stored,
    /// The payload could not be persisted. Playback is unaffected.
    Skipped { reason: String },
}

impl CacheWrite {
    pub fn is_stored(&self) -> bool {
        matches!(self, CacheWrite::Stored)
    }
}

/// Keyed store of base64 narration payloads.
pub struct NarrationCache {
    store: Arc<dyn SettingsStore>,
    config: CacheConfig,
    memory: Option<Mutex<LruCache<CacheKey, String>>>,
}

impl NarrationCache {
    /// Create a cache over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`NarrationError::Config`] if the configuration is invalid.
    pub fn new(store: Arc<dyn SettingsStore>, config: CacheConfig) -> Result<Self> {
        config.validate().map_err(NarrationError::Config)?;

        let memory = NonZeroUsize::new(config.memory_entries)
            .map(|capacity| Mutex::new(LruCache::new(capacity)));

        Ok(Self {
            store,
            config,
            memory,
        })
    }

    /// Key namespace in use.
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Derive the key for a topic title.
    pub fn key_for(&self, title: &str) -> CacheKey {
        CacheKey::derive(&self.config.namespace, title)
    }

    /// Look up a payload. Store failures are logged and reported as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        if let Some(memory) = &self.memory {
            if let Some(payload) = memory.lock().get(key) {
                debug!(cache_key = %key, "Narration cache hit (memory)");
                return Some(payload.clone());
            }
        }

        match self.store.get_string(key.as_str()).await {
            Ok(Some(payload)) => {
                debug!(cache_key = %key, "Narration cache hit (store)");
                self.remember(key, &payload);
                Some(payload)
            }
            Ok(None) => {
                debug!(cache_key = %key, "Narration cache miss");
                None
            }
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Narration cache read failed; treating as miss");
                None
            }
        }
    }

    /// Persist a payload.
    ///
    /// The in-memory layer is updated even when the store rejects the write,
    /// so the payload can still be replayed until the process exits.
    pub async fn set(&self, key: &CacheKey, payload: &str) -> CacheWrite {
        self.remember(key, payload);

        match self.store.set_string(key.as_str(), payload).await {
            Ok(()) => {
                debug!(cache_key = %key, bytes = payload.len(), "Narration audio cached");
                CacheWrite::Stored
            }
            Err(BridgeError::QuotaExceeded(msg)) => {
                warn!(cache_key = %key, bytes = payload.len(), "Narration cache full: {}", msg);
                CacheWrite::Skipped {
                    reason: format!("storage quota exceeded: {msg}"),
                }
            }
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Narration cache write failed");
                CacheWrite::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Returns `true` if a payload is available for `key`.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        if let Some(memory) = &self.memory {
            if memory.lock().contains(key) {
                return true;
            }
        }

        match self.store.has_key(key.as_str()).await {
            Ok(found) => found,
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Narration cache lookup failed");
                false
            }
        }
    }

    fn remember(&self, key: &CacheKey, payload: &str) {
        if let Some(memory) = &self.memory {
            memory.lock().put(key.clone(), payload.to_string());
        }
    }
}
