//! # Audio Decoder Module
//!
//! Turns the speech service's base64 payload into playable PCM.
//!
//! The payload is headerless signed 16-bit little-endian PCM. Decoding is two
//! steps: base64 to bytes, then bytes to planar `f32` samples via
//! [`SampleConverter`].

pub mod sample_converter;

pub use sample_converter::SampleConverter;

use crate::error::{NarrationError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bridge_traits::PcmBuffer;
use core_runtime::config::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};
use tracing::debug;

/// Decoder for base64-encoded PCM16 payloads with a fixed output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmDecoder {
    sample_rate: u32,
    channel_count: u16,
}

impl Default for PcmDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS)
    }
}

impl PcmDecoder {
    pub fn new(sample_rate: u32, channel_count: u16) -> Self {
        Self {
            sample_rate,
            channel_count,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Decode a payload in the configured format.
    pub fn decode(&self, payload: &str) -> Result<PcmBuffer> {
        let bytes = Self::decode_base64(payload)?;
        let buffer = Self::decode_pcm16(&bytes, self.sample_rate, self.channel_count)?;
        debug!(
            frames = buffer.frames(),
            duration_ms = buffer.duration().as_millis() as u64,
            "Decoded narration audio"
        );
        Ok(buffer)
    }

    /// Decode standard-alphabet base64. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`NarrationError::Decode`] if the payload is empty, malformed,
    /// or decodes to zero bytes.
    pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            return Err(NarrationError::Decode("audio payload is empty".to_string()));
        }

        let bytes = STANDARD
            .decode(trimmed)
            .map_err(|e| NarrationError::Decode(format!("invalid base64: {e}")))?;

        if bytes.is_empty() {
            return Err(NarrationError::Decode(
                "audio payload decoded to zero bytes".to_string(),
            ));
        }

        Ok(bytes)
    }

    /// Interpret `bytes` as interleaved PCM16 little-endian samples.
    ///
    /// # Errors
    ///
    /// Returns [`NarrationError::Decode`] if `bytes` is empty, if the format
    /// is degenerate, or if no complete frame is present.
    pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channel_count: u16) -> Result<PcmBuffer> {
        if bytes.is_empty() {
            return Err(NarrationError::Decode("PCM data is empty".to_string()));
        }
        if sample_rate == 0 {
            return Err(NarrationError::Decode(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        if channel_count == 0 {
            return Err(NarrationError::Decode(
                "channel count must be greater than 0".to_string(),
            ));
        }

        let channels = SampleConverter::pcm16_le_to_planar(bytes, usize::from(channel_count));
        let buffer = PcmBuffer::new(sample_rate, channels);
        if buffer.is_empty() {
            return Err(NarrationError::Decode(format!(
                "{} bytes do not hold a complete {}-channel frame",
                bytes.len(),
                channel_count
            )));
        }

        Ok(buffer)
    }
}
