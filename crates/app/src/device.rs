//! CPAL-backed implementation of the core capture seam.
//!
//! CPAL delivers samples through a callback on its own thread and its stream
//! handles do not cross threads, so `open` spawns a pump thread that owns the
//! stream for its whole life. The callback encodes incoming samples into the
//! configured byte format and hands blocks to `read` over a bounded channel;
//! when the reader lags, whole blocks are dropped and counted rather than
//! ever stalling the callback.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use wavescope_core::{encode_sample, CaptureDevice, CaptureFormat, Result, WavescopeError};

/// Callback blocks buffered between the pump thread and `read`. Each block
/// is one callback's worth of audio, so this covers a comfortable lag.
const BLOCK_QUEUE_LEN: usize = 32;

/// List input device names so the CLI can expose a selector.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|err| WavescopeError::Device(err.to_string()))?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

/// Audio input device speaking the core's byte-oriented capture contract.
pub struct CpalDevice {
    preferred: Option<String>,
    pump: Option<Pump>,
    pending: VecDeque<u8>,
}

struct Pump {
    receiver: Receiver<Vec<u8>>,
    stop: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl CpalDevice {
    /// A device by name, or the host default when `preferred` is `None`.
    pub fn new(preferred: Option<String>) -> Self {
        Self {
            preferred,
            pump: None,
            pending: VecDeque::new(),
        }
    }
}

impl CaptureDevice for CpalDevice {
    fn open(&mut self, format: &CaptureFormat) -> Result<()> {
        let (sender, receiver) = bounded(BLOCK_QUEUE_LEN);
        let (ready_sender, ready_receiver) = bounded::<std::result::Result<(), String>>(1);
        let stop = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicUsize::new(0));

        let preferred = self.preferred.clone();
        let format = *format;
        let pump_stop = stop.clone();
        let pump_dropped = dropped.clone();
        let handle = std::thread::Builder::new()
            .name("cpal-pump".to_string())
            .spawn(move || {
                pump_main(preferred, format, sender, ready_sender, pump_stop, pump_dropped)
            })?;

        match ready_receiver.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {
                self.pump = Some(Pump {
                    receiver,
                    stop,
                    dropped,
                    handle,
                });
                self.pending.clear();
                Ok(())
            }
            Ok(Err(message)) => {
                let _ = handle.join();
                Err(WavescopeError::Device(message))
            }
            Err(_) => {
                stop.store(true, Ordering::Relaxed);
                let _ = handle.join();
                Err(WavescopeError::device("audio stream did not start in time"))
            }
        }
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let Self { pump, pending, .. } = self;
        let pump = pump
            .as_ref()
            .ok_or_else(|| WavescopeError::device("device is not open"))?;

        let mut filled = 0;
        while filled < buffer.len() {
            if let Some(byte) = pending.pop_front() {
                buffer[filled] = byte;
                filled += 1;
                continue;
            }
            if filled == 0 {
                // Device-paced blocking wait for the first block.
                match pump.receiver.recv() {
                    Ok(block) => pending.extend(block),
                    Err(_) => return Err(WavescopeError::device("audio stream terminated")),
                }
            } else {
                // Hand back whatever has arrived; leftovers stay pending so
                // frames are never split across reads.
                match pump.receiver.try_recv() {
                    Ok(block) => pending.extend(block),
                    Err(_) => break,
                }
            }
        }
        Ok(filled)
    }

    fn close(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.stop.store(true, Ordering::Relaxed);
            if pump.handle.join().is_err() {
                tracing::warn!("audio pump thread panicked during shutdown");
            }
            let dropped = pump.dropped.load(Ordering::Relaxed);
            if dropped > 0 {
                tracing::warn!(dropped, "capture blocks dropped while the reader lagged");
            }
        }
        self.pending.clear();
    }
}

fn pump_main(
    preferred: Option<String>,
    format: CaptureFormat,
    sender: Sender<Vec<u8>>,
    ready: Sender<std::result::Result<(), String>>,
    stop: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
) {
    let device = match find_device(preferred.as_deref()) {
        Ok(device) => device,
        Err(message) => {
            let _ = ready.send(Err(message));
            return;
        }
    };
    let sample_format = match device.default_input_config() {
        Ok(config) => config.sample_format(),
        Err(err) => {
            let _ = ready.send(Err(err.to_string()));
            return;
        }
    };

    let stream_config = StreamConfig {
        channels: format.channels,
        sample_rate: SampleRate(format.sample_rate),
        buffer_size: BufferSize::Default,
    };
    let encoder = BlockEncoder {
        format,
        sender,
        dropped,
    };

    // Convert every supported sample type to f32 up front so encoding stays
    // format-agnostic.
    let built = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| encoder.push(data, |sample| sample),
            log_stream_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| encoder.push(data, |sample| f32::from(sample) / 32_768.0),
            log_stream_error,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &stream_config,
            move |data: &[u16], _| {
                encoder.push(data, |sample| (f32::from(sample) - 32_768.0) / 32_768.0)
            },
            log_stream_error,
            None,
        ),
        other => {
            let _ = ready.send(Err(format!("unsupported sample format: {other:?}")));
            return;
        }
    };

    let stream = match built {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready.send(Err(err.to_string()));
            return;
        }
    };
    if let Err(err) = stream.play() {
        let _ = ready.send(Err(err.to_string()));
        return;
    }
    let _ = ready.send(Ok(()));

    // The stream lives as long as this thread; the callback does the work.
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(25));
    }
    drop(stream);
}

fn log_stream_error(err: cpal::StreamError) {
    tracing::warn!(%err, "audio stream error");
}

fn find_device(preferred: Option<&str>) -> std::result::Result<cpal::Device, String> {
    let host = cpal::default_host();
    match preferred {
        Some(name) => {
            let mut devices = host.input_devices().map_err(|err| err.to_string())?;
            devices
                .find(|device| device.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| format!("input device '{name}' not found"))
        }
        None => host
            .default_input_device()
            .ok_or_else(|| "no default input device available".to_string()),
    }
}

/// Quantises f32 samples to the configured width and byte order, then hands
/// the block over without ever blocking the audio callback.
#[derive(Clone)]
struct BlockEncoder {
    format: CaptureFormat,
    sender: Sender<Vec<u8>>,
    dropped: Arc<AtomicUsize>,
}

impl BlockEncoder {
    fn push<T: Copy>(&self, data: &[T], convert: impl Fn(T) -> f32) {
        let scale = f64::from(u32::from(self.format.bits_per_sample) - 1).exp2() - 1.0;
        let mut block = Vec::with_capacity(data.len() * self.format.frame_size());
        for &raw in data {
            let value = (f64::from(convert(raw).clamp(-1.0, 1.0)) * scale).round() as i32;
            block.extend_from_slice(&encode_sample(
                value,
                self.format.bits_per_sample,
                self.format.big_endian,
            ));
        }
        match self.sender.try_send(block) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
