//! # Narration Error Types
//!
//! Typed errors for every stage of the narration pipeline, plus the
//! user-facing [`FailureKind`] classification the orchestrator publishes.

use bridge_traits::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure reported by a remote generative service.
///
/// Classification happens where the response is parsed, so nothing upstream
/// needs to inspect message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// HTTP 429 or a `RESOURCE_EXHAUSTED` status.
    #[error("Service quota exhausted: {0}")]
    QuotaExceeded(String),

    /// Transport failure before a response arrived.
    #[error("Network failure: {0}")]
    Network(String),

    /// The call succeeded but carried no usable payload.
    #[error("Service returned no {0}")]
    EmptyResponse(String),

    /// Any other rejection or malformed response.
    #[error("Service request failed: {0}")]
    Other(String),
}

impl From<BridgeError> for ServiceError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Network(msg) => ServiceError::Network(msg),
            BridgeError::QuotaExceeded(msg) => ServiceError::QuotaExceeded(msg),
            other => ServiceError::Other(other.to_string()),
        }
    }
}

/// Errors that can occur while narrating a topic.
#[derive(Error, Debug)]
pub enum NarrationError {
    // ========================================================================
    // Pipeline Errors
    // ========================================================================
    /// The script service failed or returned no text.
    #[error("Script generation failed: {0}")]
    Generation(#[source] ServiceError),

    /// The speech service failed or returned no audio.
    #[error("Speech synthesis failed: {0}")]
    Synthesis(#[source] ServiceError),

    /// The audio payload could not be turned into PCM.
    #[error("Audio decode failed: {0}")]
    Decode(String),

    // ========================================================================
    // Playback Errors
    // ========================================================================
    /// The output device refused to open, resume or start.
    #[error("Playback failed: {0}")]
    Playback(String),

    /// `play` was called after `teardown` and before the next `init`.
    #[error("Playback controller is torn down")]
    TornDown,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NarrationError {
    /// User-facing classification of this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            NarrationError::Generation(ServiceError::QuotaExceeded(_))
            | NarrationError::Synthesis(ServiceError::QuotaExceeded(_)) => {
                FailureKind::QuotaExceeded
            }
            NarrationError::Generation(ServiceError::Network(_))
            | NarrationError::Synthesis(ServiceError::Network(_)) => FailureKind::Network,
            _ => FailureKind::Generic,
        }
    }

    /// Returns `true` if retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NarrationError::Generation(ServiceError::Network(_))
                | NarrationError::Synthesis(ServiceError::Network(_))
                | NarrationError::Playback(_)
        )
    }
}

/// What the learner is told when narration fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    QuotaExceeded,
    Network,
    Generic,
}

impl FailureKind {
    /// Message shown next to the narration control.
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::QuotaExceeded => "Daily audio limit reached.",
            FailureKind::Network => "Network issue detected.",
            FailureKind::Generic => "Audio generation failed.",
        }
    }

    /// Stable identifier used in events and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::QuotaExceeded => "quota_exceeded",
            FailureKind::Network => "network",
            FailureKind::Generic => "generic",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user_message())
    }
}

/// Result type for narration operations.
pub type Result<T> = std::result::Result<T, NarrationError>;
