//! Amplitude companding: decoded samples to vertical pixel offsets.

use crate::config::{CaptureFormat, DisplayMode, ViewerSettings};

/// Maps a signed sample onto a pixel offset from the vertical centreline.
/// Pure; rebuilt by the display loop whenever viewer settings change.
#[derive(Debug, Clone, Copy)]
pub struct AmplitudeMapper {
    max_magnitude: f64,
    mode: DisplayMode,
    vertical_zoom: f64,
}

impl AmplitudeMapper {
    pub fn new(format: &CaptureFormat, settings: &ViewerSettings) -> Self {
        // Signed formats spend one bit on the sign, so full scale is one
        // power of two lower.
        let bits = u32::from(format.bits_per_sample) - u32::from(format.signed);
        Self {
            max_magnitude: f64::from(bits).exp2(),
            mode: settings.display_mode,
            vertical_zoom: f64::from(settings.vertical_zoom),
        }
    }

    /// Vertical offset in pixels from the centreline for `sample` on a
    /// surface `height` pixels tall. Zero amplitude maps exactly to zero in
    /// both modes; the caller draws that case in the accent colour.
    pub fn pixel_offset(&self, sample: i32, height: u32) -> i32 {
        let ratio = f64::from(sample) / self.max_magnitude;
        let half_height = f64::from(height / 2);
        match self.mode {
            DisplayMode::Linear => {
                let amplitude = ratio * half_height * self.vertical_zoom;
                // Sub-pixel magnitudes collapse to the centreline, a hard
                // noise floor rather than a smooth taper.
                if amplitude.abs() < 1.0 {
                    0
                } else {
                    amplitude as i32
                }
            }
            DisplayMode::Log => {
                // |ratio| stays within [0, 1], so the power sits in [1, 10]
                // and the shifted magnitude in [0, 9]; rescale to [0, 10].
                let magnitude = 10f64.powf(ratio.abs()) - 1.0;
                let rescaled = 10.0 * (magnitude / 9.0);
                (ratio.signum() * rescaled * (half_height / 10.0) * self.vertical_zoom) as i32
            }
        }
    }
}
