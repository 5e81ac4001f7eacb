//! In-memory settings store
//!
//! Volatile [`SettingsStore`] used by tests and by hosts that opt out of
//! persistence. Supports the same byte quota semantics as the SQLite store so
//! capacity exhaustion can be exercised without a database.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    entries: RwLock<BTreeMap<String, String>>,
    quota_bytes: Option<u64>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total size of stored keys and values.
    pub fn with_quota(bytes: u64) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota_bytes: Some(bytes),
        }
    }

    /// Total bytes currently held (keys plus values).
    pub fn used_bytes(&self) -> u64 {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write();

        if let Some(quota) = self.quota_bytes {
            let used: u64 = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| (k.len() + v.len()) as u64)
                .sum();
            let incoming = (key.len() + value.len()) as u64;
            if used + incoming > quota {
                warn!(key = key, used, incoming, quota, "Settings write rejected by quota");
                return Err(BridgeError::QuotaExceeded(format!(
                    "storing {} bytes under '{}' would exceed the {} byte limit",
                    incoming, key, quota
                )));
            }
        }

        entries.insert(key.to_string(), value.to_string());
        debug!(key = key, bytes = value.len(), "Stored setting");
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    async fn clear_all(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}
