//! Script generation

use crate::error::{NarrationError, Result, ServiceError};
use crate::prompt::lecture_prompt;
use crate::traits::{GenerativeClient, ScriptGeneration, Topic};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Drafts lecture scripts with a text model.
pub struct ScriptGenerator {
    client: Arc<dyn GenerativeClient>,
    model: String,
}

impl ScriptGenerator {
    pub fn new(client: Arc<dyn GenerativeClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ScriptGeneration for ScriptGenerator {
    #[instrument(skip(self, topic), fields(title = %topic.title, model = %self.model))]
    async fn generate(&self, topic: &Topic) -> Result<String> {
        let prompt = lecture_prompt(topic);
        let text = self
            .client
            .generate_text(&self.model, &prompt)
            .await
            .map_err(NarrationError::Generation)?;

        let script = text.trim();
        if script.is_empty() {
            return Err(NarrationError::Generation(ServiceError::EmptyResponse(
                "script text".to_string(),
            )));
        }

        debug!(words = script.split_whitespace().count(), "Script drafted");
        Ok(script.to_string())
    }
}
