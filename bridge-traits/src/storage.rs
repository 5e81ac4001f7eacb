//! Key-Value Storage Abstraction
//!
//! Provides a platform-agnostic trait for small persistent string values:
//! narration cache entries, completed lesson modules, and similar state that
//! must survive a restart.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Abstracts platform-specific key-value storage:
/// - Desktop: SQLite database in the application data directory
/// - Web: localStorage (capacity-limited)
/// - Tests: in-memory map
///
/// Stores may enforce a capacity limit. A write that would exceed it must
/// fail with [`BridgeError::QuotaExceeded`](crate::error::BridgeError::QuotaExceeded)
/// and leave the previous value for that key untouched.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember(store: &dyn SettingsStore) -> Result<()> {
///     store.set_string("physics_narrationCache_v1_DopplerShift", &payload).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value, replacing any previous value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool>;

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all settings
    async fn clear_all(&self) -> Result<()>;
}
