//! # Sample Format Converter
//!
//! Converts raw little-endian 16-bit PCM into planar `f32` channels.

/// Scale factor mapping `i16` onto `[-1.0, 1.0)`.
pub const I16_SCALE: f32 = 32768.0;

/// Converter for signed 16-bit little-endian PCM.
pub struct SampleConverter;

impl SampleConverter {
    /// Convert interleaved PCM16 bytes into one sample vector per channel.
    ///
    /// An odd trailing byte is ignored, as are trailing samples that do not
    /// complete a frame. `channel_count` must be non-zero.
    pub fn pcm16_le_to_planar(bytes: &[u8], channel_count: usize) -> Vec<Vec<f32>> {
        debug_assert!(channel_count > 0);
        let frame_bytes = 2 * channel_count;
        let frames = bytes.len() / frame_bytes;

        let mut channels: Vec<Vec<f32>> = (0..channel_count)
            .map(|_| Vec::with_capacity(frames))
            .collect();

        for frame in bytes.chunks_exact(frame_bytes) {
            for (channel, sample) in channels.iter_mut().zip(frame.chunks_exact(2)) {
                channel.push(Self::sample_to_f32([sample[0], sample[1]]));
            }
        }

        channels
    }

    /// Convert a single little-endian sample.
    #[inline]
    pub fn sample_to_f32(bytes: [u8; 2]) -> f32 {
        f32::from(i16::from_le_bytes(bytes)) / I16_SCALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_extremes() {
        assert_eq!(SampleConverter::sample_to_f32(0i16.to_le_bytes()), 0.0);
        assert_eq!(SampleConverter::sample_to_f32(i16::MIN.to_le_bytes()), -1.0);
        let max = SampleConverter::sample_to_f32(i16::MAX.to_le_bytes());
        assert!(max < 1.0 && max > 0.9999);
        assert_eq!(SampleConverter::sample_to_f32(16384i16.to_le_bytes()), 0.5);
    }

    #[test]
    fn mono_drops_odd_trailing_byte() {
        let bytes = [0x00, 0x40, 0x00, 0xC0, 0x7F];
        let planar = SampleConverter::pcm16_le_to_planar(&bytes, 1);
        assert_eq!(planar, vec![vec![0.5, -0.5]]);
    }

    #[test]
    fn stereo_is_deinterleaved() {
        let mut bytes = Vec::new();
        for sample in [16384i16, -16384, 8192, -8192] {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        let planar = SampleConverter::pcm16_le_to_planar(&bytes, 2);
        assert_eq!(planar, vec![vec![0.5, 0.25], vec![-0.5, -0.25]]);
    }

    #[test]
    fn incomplete_frame_is_dropped() {
        let mut bytes = Vec::new();
        for sample in [16384i16, -16384, 8192] {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        let planar = SampleConverter::pcm16_le_to_planar(&bytes, 2);
        assert_eq!(planar, vec![vec![0.5], vec![-0.5]]);
    }
}
