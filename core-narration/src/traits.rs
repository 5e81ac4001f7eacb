//! # Narration Service Traits
//!
//! Seams between the orchestrator and the remote services it depends on.
//! Production code uses [`ScriptGenerator`](crate::ScriptGenerator) and
//! [`AudioSynthesizer`](crate::AudioSynthesizer) over a
//! [`GeminiClient`](crate::GeminiClient); tests substitute their own.

use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Lesson topic to narrate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    pub description: String,
}

impl Topic {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Parameters for one speech synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub model: String,
    pub text: String,
    pub voice: String,
}

/// Low-level generative service.
///
/// Implementations classify failures into [`ServiceError`] so callers never
/// inspect message text.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Generate text for `prompt`. Returns the concatenated text parts,
    /// which may be empty.
    async fn generate_text(&self, model: &str, prompt: &str) -> std::result::Result<String, ServiceError>;

    /// Synthesize speech. Returns the base64 audio payload.
    async fn generate_speech(&self, request: &SpeechRequest) -> std::result::Result<String, ServiceError>;
}

/// Drafts a lecture script for a topic.
#[async_trait]
pub trait ScriptGeneration: Send + Sync {
    /// # Errors
    ///
    /// Returns [`NarrationError::Generation`](crate::NarrationError::Generation)
    /// on service failure or when no text comes back.
    async fn generate(&self, topic: &Topic) -> Result<String>;
}

/// Voices a script.
#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    /// Returns base64-encoded PCM16 audio.
    ///
    /// # Errors
    ///
    /// Returns [`NarrationError::Synthesis`](crate::NarrationError::Synthesis)
    /// on service failure or when no audio comes back.
    async fn synthesize(&self, script: &str) -> Result<String>;
}
