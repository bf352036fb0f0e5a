//! Fixed-width PCM decoding: raw capture bytes to signed integer samples.

use crate::config::CaptureFormat;

/// Decode failure. Both variants are fatal to the capture session; emitting
/// corrupt samples is worse than stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The buffer does not hold a whole number of frames.
    #[error("buffer of {len} bytes is not a whole number of {frame_size}-byte frames")]
    Misaligned { len: usize, frame_size: usize },
    /// Interleaved channels reported unequal sample counts in one read.
    #[error("{frames} frames do not divide evenly across {channels} channels")]
    ChannelMismatch { frames: usize, channels: u16 },
}

/// Turns raw byte blocks into signed samples. Pure; carries only the frame
/// geometry copied out of the capture format.
#[derive(Debug, Clone, Copy)]
pub struct SampleDecoder {
    frame_size: usize,
    big_endian: bool,
    channels: u16,
}

impl SampleDecoder {
    pub fn new(format: &CaptureFormat) -> Self {
        Self {
            frame_size: format.frame_size().clamp(1, 4),
            big_endian: format.big_endian,
            channels: format.channels.max(1),
        }
    }

    /// Decodes a buffer into freshly allocated samples.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<i32>, DecodeError> {
        let mut samples = Vec::with_capacity(bytes.len() / self.frame_size);
        self.decode_into(bytes, &mut samples)?;
        Ok(samples)
    }

    /// Decodes a buffer, appending to `samples` so the capture loop can reuse
    /// its allocation across reads.
    pub fn decode_into(&self, bytes: &[u8], samples: &mut Vec<i32>) -> Result<(), DecodeError> {
        if bytes.len() % self.frame_size != 0 {
            return Err(DecodeError::Misaligned {
                len: bytes.len(),
                frame_size: self.frame_size,
            });
        }
        let frames = bytes.len() / self.frame_size;
        if frames % usize::from(self.channels) != 0 {
            return Err(DecodeError::ChannelMismatch {
                frames,
                channels: self.channels,
            });
        }
        samples.reserve(frames);
        for frame in bytes.chunks_exact(self.frame_size) {
            samples.push(self.decode_frame(frame));
        }
        Ok(())
    }

    fn decode_frame(&self, frame: &[u8]) -> i32 {
        let mut raw = 0u32;
        if self.big_endian {
            for &byte in frame {
                raw = raw << 8 | u32::from(byte);
            }
        } else {
            for &byte in frame.iter().rev() {
                raw = raw << 8 | u32::from(byte);
            }
        }
        // Standard two's-complement sign extension for the frame width.
        let shift = 32 - self.frame_size as u32 * 8;
        ((raw << shift) as i32) >> shift
    }
}

/// Exact inverse of the decoder for one sample: the low `bits/8` bytes of the
/// value in the requested byte order. Used by synthetic devices and by
/// adapters that feed typed samples into the byte-oriented capture path.
pub fn encode_sample(value: i32, bits_per_sample: u8, big_endian: bool) -> Vec<u8> {
    let frame_size = usize::from(bits_per_sample / 8).clamp(1, 4);
    let mut frame = (value as u32).to_be_bytes()[4 - frame_size..].to_vec();
    if !big_endian {
        frame.reverse();
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(bits: u8, big_endian: bool, channels: u16) -> SampleDecoder {
        SampleDecoder::new(&CaptureFormat {
            bits_per_sample: bits,
            big_endian,
            channels,
            ..CaptureFormat::default()
        })
    }

    #[test]
    fn decodes_signed_bytes() {
        let samples = decoder(8, true, 1).decode(&[0x00, 0x7F, 0x80, 0xFF]).unwrap();
        assert_eq!(samples, vec![0, 127, -128, -1]);
    }

    #[test]
    fn decodes_big_endian_sixteen_bit() {
        let samples = decoder(16, true, 1)
            .decode(&[0x7F, 0xFF, 0x80, 0x00, 0xFF, 0xFF])
            .unwrap();
        assert_eq!(samples, vec![32_767, -32_768, -1]);
    }

    #[test]
    fn decodes_little_endian_sixteen_bit() {
        let samples = decoder(16, false, 1).decode(&[0x00, 0x80, 0x01, 0x00]).unwrap();
        assert_eq!(samples, vec![-32_768, 1]);
    }

    #[test]
    fn decodes_twenty_four_bit() {
        let samples = decoder(24, true, 1)
            .decode(&[0x80, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0x7F, 0xFF, 0xFF])
            .unwrap();
        assert_eq!(samples, vec![-8_388_608, -1, 8_388_607]);
    }

    #[test]
    fn sample_count_and_range_follow_the_width() {
        let bytes: Vec<u8> = (0..=255).collect();
        for bits in [8u8, 16, 32] {
            let frame_size = usize::from(bits / 8);
            let samples = decoder(bits, true, 1).decode(&bytes).unwrap();
            assert_eq!(samples.len(), bytes.len() / frame_size);
            let limit = 2f64.powi(i32::from(bits) - 1);
            for sample in samples {
                assert!(f64::from(sample) >= -limit && f64::from(sample) < limit);
            }
        }
    }

    #[test]
    fn rejects_misaligned_buffers() {
        let err = decoder(16, true, 1).decode(&[0x01, 0x02, 0x03]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Misaligned {
                len: 3,
                frame_size: 2
            }
        );
    }

    #[test]
    fn rejects_unbalanced_channel_reads() {
        let err = decoder(8, true, 2).decode(&[0x01, 0x02, 0x03]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::ChannelMismatch {
                frames: 3,
                channels: 2
            }
        );
    }

    #[test]
    fn encode_round_trips_known_values() {
        for (value, bits) in [
            (-1, 8),
            (127, 8),
            (-32_768, 16),
            (12_345, 16),
            (-4_660_000, 24),
            (i32::MIN, 32),
        ] {
            for big_endian in [true, false] {
                let frame = encode_sample(value, bits, big_endian);
                let decoded = decoder(bits, big_endian, 1).decode(&frame).unwrap();
                assert_eq!(decoded, vec![value], "{value} at {bits} bits");
            }
        }
    }
}
