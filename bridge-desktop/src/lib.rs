//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridge traits
//! using desktop-appropriate libraries:
//! - `HttpClient` using `reqwest`
//! - `SettingsStore` using a SQLite-backed key-value store
//! - `SettingsStore` held in memory, for tests and ephemeral sessions
//! - `AudioBackend` using `rodio` (behind the `audio-output` feature)
//!
//! ## Feature Flags
//!
//! - `audio-output`: Enable speaker output through `rodio`. Requires the
//!   platform audio development libraries (ALSA on Linux).
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let store = SqliteSettingsStore::new("narration.db".into()).await?;
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod http;
mod memory;
mod settings;

#[cfg(feature = "audio-output")]
mod audio;

pub use http::ReqwestHttpClient;
pub use memory::MemorySettingsStore;
pub use settings::SqliteSettingsStore;

#[cfg(feature = "audio-output")]
pub use audio::{RodioAudioBackend, RodioAudioContext};

use std::path::PathBuf;

/// Per-user application data directory for the narration core.
///
/// Falls back to `~/.local/share` and finally the working directory when the
/// platform reports no data directory.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        })
        .join("lesson-narration")
}
