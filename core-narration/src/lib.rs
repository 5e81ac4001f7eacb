//! # Lesson Narration Core
//!
//! Turns a lesson topic into a spoken mini-lecture and plays it, one panel at
//! a time.
//!
//! ## Overview
//!
//! A learner presses the narration control on a topic panel. The panel's
//! [`NarrationOrchestrator`] then:
//! - looks the topic up in the [`NarrationCache`] and replays stored audio
//! - otherwise drafts a script with the [`ScriptGenerator`] and voices it
//!   with the [`AudioSynthesizer`], caching the result best-effort
//! - decodes the 16-bit PCM payload with the [`PcmDecoder`]
//! - hands the samples to the shared [`PlaybackController`], which keeps at
//!   most one session audible across every panel
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────┐
//! │   NarrationOrchestrator   │  one per panel
//! └──┬──────┬──────┬──────┬───┘
//!    │      │      │      │
//!    │      │      │      └──> PlaybackController (shared) ──> AudioBackend
//!    │      │      └─────────> PcmDecoder
//!    │      └────────────────> ScriptGenerator / AudioSynthesizer ──> GeminiClient ──> HttpClient
//!    └───────────────────────> NarrationCache ──> SettingsStore
//! ```

pub mod cache;
pub mod decoder;
pub mod error;
pub mod gemini;
pub mod orchestrator;
pub mod playback;
pub mod prompt;
pub mod script;
pub mod speech;
pub mod traits;

pub use cache::{CacheConfig, CacheKey, CacheWrite, NarrationCache};
pub use decoder::PcmDecoder;
pub use error::{FailureKind, NarrationError, Result, ServiceError};
pub use gemini::GeminiClient;
pub use orchestrator::{
    NarrationComponents, NarrationOrchestrator, NarrationOutcome, NarrationSnapshot,
    NarrationState,
};
pub use playback::{HaltObserver, PlaybackController, PlaybackEnd, SessionHandle, SessionId};
pub use script::ScriptGenerator;
pub use speech::AudioSynthesizer;
pub use traits::{GenerativeClient, ScriptGeneration, SpeechRequest, SpeechSynthesis, Topic};
