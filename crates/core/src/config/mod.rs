use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, WavescopeError};

/// Sample rates the capture path accepts, in hertz.
pub const SUPPORTED_SAMPLE_RATES: [u32; 4] = [8_000, 44_100, 48_000, 96_000];

/// Sample widths the decoder handles, in bits.
pub const SUPPORTED_BIT_DEPTHS: [u8; 4] = [8, 16, 24, 32];

/// How decoded amplitudes are companded onto the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayMode {
    /// Pixel offset proportional to the sample value.
    Linear,
    /// Compresses large amplitudes and expands small ones for readability.
    Log,
}

/// PCM format a capture session opens its device with. Immutable while the
/// session runs; changing any field requires a stop and restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u8,
    pub channels: u16,
    pub signed: bool,
    pub big_endian: bool,
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            bits_per_sample: 8,
            channels: 1,
            signed: true,
            big_endian: true,
        }
    }
}

impl CaptureFormat {
    /// Width of one sample on the wire, in bytes (1 to 4).
    pub fn frame_size(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Raw bytes covering one second of capture across all channels.
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.frame_size() * usize::from(self.channels)
    }

    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(WavescopeError::Config(format!(
                "unsupported sample rate {} Hz",
                self.sample_rate
            )));
        }
        if !SUPPORTED_BIT_DEPTHS.contains(&self.bits_per_sample) {
            return Err(WavescopeError::Config(format!(
                "unsupported sample width {} bits",
                self.bits_per_sample
            )));
        }
        if self.channels == 0 {
            return Err(WavescopeError::Config(
                "at least one channel is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Display-side settings. Unlike [`CaptureFormat`], these may be swapped
/// while a session runs; the display loop adopts them at its next frame
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewerSettings {
    /// Refresh rate of the viewer in update slices per second.
    pub updates_per_second: u32,
    pub display_mode: DisplayMode,
    /// Horizontal pixels covered by one second of audio.
    pub horizontal_zoom: f32,
    /// Multiplier for the vertical axis.
    pub vertical_zoom: f32,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            updates_per_second: 50,
            display_mode: DisplayMode::Log,
            horizontal_zoom: 40.0,
            vertical_zoom: 1.0,
        }
    }
}

impl ViewerSettings {
    pub fn validate(&self, sample_rate: u32) -> Result<()> {
        if self.updates_per_second == 0 {
            return Err(WavescopeError::Config(
                "refresh rate must be at least one update per second".to_string(),
            ));
        }
        if self.updates_per_second > sample_rate {
            return Err(WavescopeError::Config(format!(
                "refresh rate {} exceeds the sample rate {}",
                self.updates_per_second, sample_rate
            )));
        }
        if self.horizontal_zoom <= 0.0 || self.vertical_zoom <= 0.0 {
            return Err(WavescopeError::Config(
                "zoom factors must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration for a capture session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub format: CaptureFormat,
    #[serde(default)]
    pub viewer: ViewerSettings,
}

impl AppConfig {
    /// Defaults matching the built-in live mode.
    pub fn live_defaults() -> Self {
        Self::default()
    }

    /// Loads and validates a JSON preset.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|err| WavescopeError::Config(format!("malformed preset: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.format.validate()?;
        self.viewer.validate(self.format.sample_rate)
    }
}
