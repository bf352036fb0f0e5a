use std::f64::consts::TAU;
use std::time::Duration;

use crate::capture::CaptureDevice;
use crate::config::CaptureFormat;
use crate::decode::encode_sample;
use crate::{Result, WavescopeError};

/// Synthetic sine-wave input. Stands in for real hardware in the demo
/// subcommand and in tests; encodes through the same byte format a device
/// would deliver.
pub struct ToneDevice {
    frequency: f64,
    paced: bool,
    format: Option<CaptureFormat>,
    phase: f64,
}

impl ToneDevice {
    pub fn new(frequency: f64) -> Self {
        Self {
            frequency,
            paced: false,
            format: None,
            phase: 0.0,
        }
    }

    /// When paced, each read sleeps for the duration of audio it produced,
    /// mimicking a device-blocking line. Tests leave this off.
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }
}

impl CaptureDevice for ToneDevice {
    fn open(&mut self, format: &CaptureFormat) -> Result<()> {
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return Err(WavescopeError::device("tone frequency must be positive"));
        }
        self.format = Some(*format);
        self.phase = 0.0;
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let format = self
            .format
            .ok_or_else(|| WavescopeError::device("tone device is not open"))?;
        let frame_size = format.frame_size();
        let stride = frame_size * usize::from(format.channels);
        let frames = buffer.len() / stride.max(1);

        // Leave a little headroom below full scale.
        let amplitude = (f64::from(u32::from(format.bits_per_sample) - 1).exp2() - 1.0) * 0.8;
        let step = TAU * self.frequency / f64::from(format.sample_rate);

        let mut offset = 0;
        for _ in 0..frames {
            let value = (self.phase.sin() * amplitude).round() as i32;
            self.phase = (self.phase + step) % TAU;
            for _ in 0..format.channels {
                let frame = encode_sample(value, format.bits_per_sample, format.big_endian);
                buffer[offset..offset + frame_size].copy_from_slice(&frame);
                offset += frame_size;
            }
        }

        if self.paced {
            let seconds = frames as f64 / f64::from(format.sample_rate);
            std::thread::sleep(Duration::from_secs_f64(seconds));
        }
        Ok(offset)
    }

    fn close(&mut self) {
        self.format = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::SampleDecoder;

    fn open_tone(format: &CaptureFormat) -> ToneDevice {
        let mut device = ToneDevice::new(440.0);
        device.open(format).unwrap();
        device
    }

    #[test]
    fn fills_whole_frames_within_range() {
        let format = CaptureFormat {
            sample_rate: 8_000,
            bits_per_sample: 16,
            ..CaptureFormat::default()
        };
        let mut device = open_tone(&format);
        let mut buffer = vec![0u8; format.bytes_per_second()];
        let count = device.read(&mut buffer).unwrap();
        assert_eq!(count, buffer.len());

        let samples = SampleDecoder::new(&format).decode(&buffer).unwrap();
        assert_eq!(samples.len(), 8_000);
        // Phase starts at zero, so the first sample sits on the centreline.
        assert_eq!(samples[0], 0);
        assert!(samples.iter().any(|&s| s > 20_000));
        assert!(samples.iter().any(|&s| s < -20_000));
    }

    #[test]
    fn duplicates_frames_across_channels() {
        let format = CaptureFormat {
            sample_rate: 8_000,
            bits_per_sample: 8,
            channels: 2,
            ..CaptureFormat::default()
        };
        let mut device = open_tone(&format);
        let mut buffer = vec![0u8; 64];
        device.read(&mut buffer).unwrap();
        let samples = SampleDecoder::new(&format).decode(&buffer).unwrap();
        for pair in samples.chunks_exact(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }

    #[test]
    fn read_before_open_is_a_device_error() {
        let mut device = ToneDevice::new(440.0);
        let mut buffer = [0u8; 8];
        assert!(matches!(
            device.read(&mut buffer),
            Err(WavescopeError::Device(_))
        ));
    }

    #[test]
    fn rejects_non_positive_frequency() {
        let mut device = ToneDevice::new(0.0);
        assert!(device.open(&CaptureFormat::default()).is_err());
    }
}
