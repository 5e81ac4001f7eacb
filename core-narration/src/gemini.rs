//! # Generative Language Client
//!
//! Thin client for the `generateContent` endpoint used both to draft scripts
//! and to synthesize speech.
//!
//! ## Failure classification
//!
//! | Condition                                   | Result                          |
//! |---------------------------------------------|---------------------------------|
//! | HTTP 429                                    | [`ServiceError::QuotaExceeded`] |
//! | error body with status `RESOURCE_EXHAUSTED` | [`ServiceError::QuotaExceeded`] |
//! | transport failure                           | [`ServiceError::Network`]       |
//! | any other non-2xx or malformed body         | [`ServiceError::Other`]         |

use crate::error::ServiceError;
use crate::traits::{GenerativeClient, SpeechRequest};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";
const QUOTA_STATUS: &str = "RESOURCE_EXHAUSTED";

type ServiceResult<T> = std::result::Result<T, ServiceError>;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: Vec<&'a str>,
    speech_config: SpeechConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[allow(dead_code)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[ResponsePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    fn text(&self) -> String {
        self.first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    fn audio(&self) -> Option<&str> {
        self.first_parts()
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .map(|d| d.data.as_str())
            .find(|data| !data.is_empty())
    }
}

// ============================================================================
// Client
// ============================================================================

/// Client for the generative language REST API.
pub struct GeminiClient {
    http: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    timeout: Duration,
    retry_policy: RetryPolicy,
}

impl GeminiClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: core_runtime::config::DEFAULT_REQUEST_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy handed to the HTTP client.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest<'_>,
    ) -> ServiceResult<GenerateContentResponse> {
        let request = HttpRequest::new(HttpMethod::Post, self.endpoint(model))
            .api_key(API_KEY_HEADER, self.api_key.as_str())
            .timeout(self.timeout)
            .json(body)
            .map_err(|e| ServiceError::Other(e.to_string()))?;

        let response = self
            .http
            .execute_with_retry(request, self.retry_policy.clone())
            .await
            .map_err(ServiceError::from)?;

        if !response.is_success() {
            let error = classify_failure(&response);
            warn!(model, status = response.status, error = %error, "Generative service rejected request");
            return Err(error);
        }

        response
            .json::<GenerateContentResponse>()
            .map_err(|e| ServiceError::Other(e.to_string()))
    }
}

/// Map a non-2xx response to a typed error.
fn classify_failure(response: &HttpResponse) -> ServiceError {
    let body = response.json::<ErrorEnvelope>().ok().map(|e| e.error);
    let message = body
        .as_ref()
        .map(|b| b.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", response.status));

    let exhausted = body.as_ref().is_some_and(|b| b.status == QUOTA_STATUS);
    if response.is_rate_limited() || exhausted {
        ServiceError::QuotaExceeded(message)
    } else {
        ServiceError::Other(format!("HTTP {}: {}", response.status, message))
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate_text(&self, model: &str, prompt: &str) -> ServiceResult<String> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: None,
        };

        let text = self.generate_content(model, &body).await?.text();
        debug!(chars = text.len(), "Script text received");
        Ok(text)
    }

    #[instrument(skip(self, request), fields(model = %request.model, voice = %request.voice))]
    async fn generate_speech(&self, request: &SpeechRequest) -> ServiceResult<String> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: &request.text,
                }],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: &request.voice,
                        },
                    },
                },
            }),
        };

        let response = self.generate_content(&request.model, &body).await?;
        let audio = response
            .audio()
            .ok_or_else(|| ServiceError::EmptyResponse("audio".to_string()))?;
        debug!(payload_len = audio.len(), "Speech audio received");
        Ok(audio.to_string())
    }
}
