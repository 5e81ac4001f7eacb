//! Cache configuration

/// Configuration for [`NarrationCache`](super::NarrationCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Versioned key prefix (default: `physics_narrationCache_v1`)
    pub namespace: String,

    /// Entries kept in memory in front of the store (default: 8, 0 disables)
    pub memory_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: core_runtime::config::DEFAULT_CACHE_NAMESPACE.to_string(),
            memory_entries: 8,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the number of in-memory entries.
    pub fn with_memory_entries(mut self, entries: usize) -> Self {
        self.memory_entries = entries;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.namespace.is_empty() {
            return Err("namespace cannot be empty".to_string());
        }

        if !self
            .namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(format!(
                "namespace '{}' may only contain ASCII letters, digits and '_'",
                self.namespace
            ));
        }

        Ok(())
    }
}
