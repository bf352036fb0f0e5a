//! Device capture: reads raw PCM blocks and feeds decoded samples into the
//! hand-off channel until told to stop.

mod tone;

pub use tone::ToneDevice;

use crate::channel::SampleSender;
use crate::config::CaptureFormat;
use crate::decode::SampleDecoder;
use crate::session::ShutdownToken;
use crate::Result;

/// Audio input seam. Implementations live outside the core crate (or in
/// [`ToneDevice`] for hardware-free runs); the loop below only assumes
/// `read` blocks at the device's own pace.
pub trait CaptureDevice: Send {
    /// Opens the device at the requested format. Failure is fatal to the
    /// session and is surfaced to the caller, never retried here.
    fn open(&mut self, format: &CaptureFormat) -> Result<()>;

    /// Blocking read of the next block of raw bytes. Returns the number of
    /// bytes written into `buffer`.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    fn close(&mut self);
}

/// Producer-side worker: open device, then read, decode and offer samples
/// until the shutdown token is set. Sends are best-effort so a slow display
/// side never stalls the device read loop; drops are counted and logged.
pub struct CaptureLoop {
    device: Box<dyn CaptureDevice>,
    format: CaptureFormat,
    sender: SampleSender,
    shutdown: ShutdownToken,
}

impl CaptureLoop {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        format: CaptureFormat,
        sender: SampleSender,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            device,
            format,
            sender,
            shutdown,
        }
    }

    /// Runs the capture loop to completion. The device is closed on every
    /// exit path, including decode failures.
    pub fn run(mut self) -> Result<()> {
        self.device.open(&self.format)?;
        tracing::info!(
            sample_rate = self.format.sample_rate,
            bits = self.format.bits_per_sample,
            channels = self.format.channels,
            "capture started"
        );
        let result = self.pump();
        self.device.close();
        tracing::info!("capture stopped");
        result
    }

    fn pump(&mut self) -> Result<()> {
        let decoder = SampleDecoder::new(&self.format);
        // One second of audio per read, matching the channel capacity.
        let mut buffer = vec![0u8; self.format.bytes_per_second()];
        let mut samples: Vec<i32> = Vec::with_capacity(buffer.len());

        while !self.shutdown.is_set() {
            let count = self.device.read(&mut buffer)?;
            if count == 0 {
                continue;
            }
            samples.clear();
            decoder.decode_into(&buffer[..count], &mut samples)?;

            let mut dropped = 0usize;
            for &sample in samples.iter() {
                match self.sender.offer(sample) {
                    Ok(true) => {}
                    Ok(false) => dropped += 1,
                    // The display side is gone; treat it as a shutdown.
                    Err(_) => return Ok(()),
                }
            }
            if dropped > 0 {
                tracing::warn!(dropped, read = samples.len(), "display side lagging, samples dropped");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{channel, ChannelClosed};
    use crate::decode::encode_sample;

    /// Feeds scripted byte blocks, then trips the shutdown token so the loop
    /// terminates without hardware.
    struct ScriptedDevice {
        blocks: Vec<Vec<u8>>,
        next: usize,
        shutdown: ShutdownToken,
        closed: bool,
    }

    impl CaptureDevice for ScriptedDevice {
        fn open(&mut self, _format: &CaptureFormat) -> Result<()> {
            Ok(())
        }

        fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
            match self.blocks.get(self.next) {
                Some(block) => {
                    self.next += 1;
                    buffer[..block.len()].copy_from_slice(block);
                    Ok(block.len())
                }
                None => {
                    self.shutdown.shutdown();
                    Ok(0)
                }
            }
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn format_16_be() -> CaptureFormat {
        CaptureFormat {
            sample_rate: 8_000,
            bits_per_sample: 16,
            ..CaptureFormat::default()
        }
    }

    fn block_of(values: &[i32], format: &CaptureFormat) -> Vec<u8> {
        values
            .iter()
            .flat_map(|&value| encode_sample(value, format.bits_per_sample, format.big_endian))
            .collect()
    }

    #[test]
    fn decodes_and_forwards_in_order() {
        let format = format_16_be();
        let shutdown = ShutdownToken::new();
        let device = ScriptedDevice {
            blocks: vec![
                block_of(&[100, -200, 300], &format),
                block_of(&[-32_768, 32_767], &format),
            ],
            next: 0,
            shutdown: shutdown.clone(),
            closed: false,
        };
        let (sender, receiver) = channel(16);

        CaptureLoop::new(Box::new(device), format, sender, shutdown)
            .run()
            .unwrap();

        for expected in [100, -200, 300, -32_768, 32_767] {
            assert_eq!(receiver.recv(), Ok(expected));
        }
        assert_eq!(receiver.recv(), Err(ChannelClosed));
    }

    #[test]
    fn misaligned_read_stops_the_session() {
        let format = format_16_be();
        let shutdown = ShutdownToken::new();
        let device = ScriptedDevice {
            blocks: vec![vec![0x01, 0x02, 0x03]],
            next: 0,
            shutdown: shutdown.clone(),
            closed: false,
        };
        let (sender, _receiver) = channel(16);

        let err = CaptureLoop::new(Box::new(device), format, sender, shutdown)
            .run()
            .unwrap_err();
        assert!(matches!(err, crate::WavescopeError::Decode(_)));
    }

    #[test]
    fn stops_when_the_receiver_goes_away() {
        let format = format_16_be();
        let shutdown = ShutdownToken::new();
        let device = ScriptedDevice {
            blocks: vec![block_of(&[1, 2], &format); 4],
            next: 0,
            shutdown: shutdown.clone(),
            closed: false,
        };
        let (sender, receiver) = channel(16);
        drop(receiver);

        CaptureLoop::new(Box::new(device), format, sender, shutdown)
            .run()
            .unwrap();
    }
}
