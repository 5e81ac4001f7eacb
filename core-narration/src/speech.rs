//! Speech synthesis

use crate::error::{NarrationError, Result, ServiceError};
use crate::traits::{GenerativeClient, SpeechRequest, SpeechSynthesis};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Voices scripts with a fixed prebuilt voice.
///
/// Output is always base64 PCM16, mono, at the speech model's native rate.
pub struct AudioSynthesizer {
    client: Arc<dyn GenerativeClient>,
    model: String,
    voice: String,
}

impl AudioSynthesizer {
    pub fn new(
        client: Arc<dyn GenerativeClient>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            voice: voice.into(),
        }
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }
}

#[async_trait]
impl SpeechSynthesis for AudioSynthesizer {
    #[instrument(skip(self, script), fields(voice = %self.voice, script_len = script.len()))]
    async fn synthesize(&self, script: &str) -> Result<String> {
        let request = SpeechRequest {
            model: self.model.clone(),
            text: script.to_string(),
            voice: self.voice.clone(),
        };

        let payload = self
            .client
            .generate_speech(&request)
            .await
            .map_err(NarrationError::Synthesis)?;

        if payload.trim().is_empty() {
            return Err(NarrationError::Synthesis(ServiceError::EmptyResponse(
                "audio".to_string(),
            )));
        }

        debug!(payload_len = payload.len(), "Speech synthesized");
        Ok(payload)
    }
}
