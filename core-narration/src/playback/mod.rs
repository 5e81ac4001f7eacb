//! # Playback Module
//!
//! Process-wide audio output shared by every narration panel.
//!
//! [`PlaybackController`] owns the single output context and the single
//! active playback session. Starting a new session always ends the previous
//! one, so at most one narration is audible at any time.

pub mod controller;

pub use controller::{HaltObserver, PlaybackController, PlaybackEnd, SessionHandle, SessionId};
