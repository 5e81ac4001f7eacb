//! Playback bridge traits and supporting audio types.
//!
//! These abstractions let the narration core drive a platform audio engine
//! without knowing what it is. The model mirrors a browser-style audio graph:
//! a lazily created [`AudioContext`] that may start out suspended, and
//! one-shot sources started from a decoded [`PcmBuffer`] that report their
//! natural end through a detachable callback.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Decoded planar PCM audio, one `Vec<f32>` per channel, samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    /// Create a buffer from per-channel sample vectors.
    ///
    /// Channels are expected to have equal length; [`frames`](Self::frames)
    /// reports the shortest one.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples of a single channel, if it exists.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Playback length at the buffer's sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    /// Interleave the channels into a single sample vector (`L R L R ...`).
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for frame in 0..frames {
            for channel in &self.channels {
                out.push(channel[frame]);
            }
        }
        out
    }
}

/// Lifecycle state of an output context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Output is live; started sources are audible.
    Running,
    /// Output is paused by the host (e.g. autoplay policy) and must be resumed.
    Suspended,
    /// Context has been released and cannot be used again.
    Closed,
}

/// Callback fired once when a source reaches its natural end.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Factory for output contexts. Creating a context may be expensive or
/// require user interaction, so callers create one lazily and reuse it.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn create_context(&self) -> Result<Arc<dyn AudioContext>>;
}

/// An open output device.
#[async_trait]
pub trait AudioContext: Send + Sync {
    /// Current state of the context.
    fn state(&self) -> ContextState;

    /// Resume a suspended context. Resuming a running context is a no-op.
    async fn resume(&self) -> Result<()>;

    /// Start playing `buffer` immediately.
    ///
    /// `on_ended` fires at most once, only when playback finishes on its own,
    /// and never from within this call. It must not fire after
    /// [`AudioSourceHandle::clear_on_ended`] returns.
    fn start(
        &self,
        buffer: PcmBuffer,
        on_ended: EndedCallback,
    ) -> Result<Box<dyn AudioSourceHandle>>;

    /// Release the output device.
    async fn close(&self) -> Result<()>;
}

/// Control handle for a started source.
pub trait AudioSourceHandle: Send {
    /// Detach the end callback so it can no longer fire.
    fn clear_on_ended(&mut self);

    /// Halt playback. Halting does not count as a natural end.
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_buffer_reports_frames_and_duration() {
        let buffer = PcmBuffer::new(24_000, vec![vec![0.0; 12_000]]);
        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.frames(), 12_000);
        assert_eq!(buffer.duration(), Duration::from_millis(500));
        assert!(!buffer.is_empty());
    }

    #[test]
    fn pcm_buffer_interleaves_channels() {
        let buffer = PcmBuffer::new(8_000, vec![vec![0.1, 0.2], vec![-0.1, -0.2]]);
        assert_eq!(buffer.interleaved(), vec![0.1, -0.1, 0.2, -0.2]);
        assert_eq!(buffer.channel(1), Some(&[-0.1, -0.2][..]));
        assert_eq!(buffer.channel(2), None);
    }

    #[test]
    fn pcm_buffer_without_channels_is_empty() {
        let buffer = PcmBuffer::new(24_000, Vec::new());
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration(), Duration::ZERO);
    }
}
