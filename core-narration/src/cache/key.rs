//! Cache key derivation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage key for a topic's narration audio.
///
/// Formed as `"<namespace>_<sanitizedTitle>"`, where the sanitized title keeps
/// only ASCII letters and digits. Titles that differ only in punctuation or
/// spacing therefore share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `title` under `namespace`.
    pub fn derive(namespace: &str, title: &str) -> Self {
        let sanitized = sanitize_title(title);
        let mut key = String::with_capacity(namespace.len() + 1 + sanitized.len());
        key.push_str(namespace);
        key.push('_');
        key.push_str(&sanitized);
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Keep only `[A-Za-z0-9]`.
pub fn sanitize_title(title: &str) -> String {
    title.chars().filter(char::is_ascii_alphanumeric).collect()
}
