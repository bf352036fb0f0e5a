//! Adaptive frame pacing, the heart of the display side.
//!
//! One frame covers one second of audio: `sample_rate` samples drained from
//! the hand-off channel and drawn in `updates_per_second` slices. After each
//! slice the loop sleeps whatever is left of the frame budget, spread evenly
//! across the remaining updates and discounted by the smoothed per-update
//! processing cost. Without that discount every sleep would overshoot by the
//! work the next update is about to spend and the draw cadence would drift
//! later and later within the frame.

mod average;

pub use average::RunningAverage;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::channel::SampleReceiver;
use crate::config::{CaptureFormat, ViewerSettings};
use crate::mapping::AmplitudeMapper;
use crate::render::{Color, FrameCursor, Surface};
use crate::session::ShutdownToken;
use crate::{Result, WavescopeError};

/// The pacing budget: audio arrives in one-second frames.
const FRAME_DURATION: Duration = Duration::from_secs(1);

/// Rendering backend shared between the display loop and whatever observes
/// resizes. The lock is held for one slice of drawing, never across a sleep.
pub type SharedSurface = Arc<Mutex<dyn Surface + Send>>;

/// Viewer settings handle; swapped values take effect at the next frame
/// boundary.
pub type SharedSettings = Arc<Mutex<ViewerSettings>>;

/// Sleep seam so pacing tests can run without wall-clock waits.
pub(crate) trait Sleeper: Send {
    fn sleep(&mut self, duration: Duration);
}

struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

enum FrameOutcome {
    Continue,
    Stopped,
}

/// Display-side worker: drains the sample channel in update slices, maps
/// amplitudes to pixels and keeps the draw cadence aligned to the one-second
/// frame boundary.
pub struct FramePacer {
    receiver: SampleReceiver,
    format: CaptureFormat,
    settings: SharedSettings,
    surface: SharedSurface,
    shutdown: ShutdownToken,
    average: RunningAverage,
    cursor: FrameCursor,
    sleeper: Box<dyn Sleeper>,
    started: Instant,
}

impl FramePacer {
    pub fn new(
        receiver: SampleReceiver,
        format: CaptureFormat,
        settings: SharedSettings,
        surface: SharedSurface,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            receiver,
            format,
            settings,
            surface,
            shutdown,
            average: RunningAverage::new(),
            cursor: FrameCursor::new(),
            sleeper: Box::new(ThreadSleeper),
            started: Instant::now(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Runs frames until the shutdown token is set or the channel closes.
    pub fn run(mut self) -> Result<()> {
        tracing::info!("viewer started");
        loop {
            match self.run_frame()? {
                FrameOutcome::Continue => {}
                FrameOutcome::Stopped => {
                    tracing::info!("viewer stopped");
                    return Ok(());
                }
            }
        }
    }

    fn run_frame(&mut self) -> Result<FrameOutcome> {
        self.average.reset();
        // Settings changes land here, at the frame boundary, together with
        // the slice geometry they imply.
        let settings = self.snapshot_settings()?;
        let updates_per_second = settings.updates_per_second.max(1);
        let samples_per_update = (self.format.sample_rate / updates_per_second).max(1);
        let mapper = AmplitudeMapper::new(&self.format, &settings);

        let mut slice = Vec::with_capacity(samples_per_update as usize);
        let mut frame_begin = Instant::now();
        let mut update_index = 1u32;

        for sample_index in 1..=self.format.sample_rate {
            let sample = match self.receiver.recv() {
                Ok(sample) => sample,
                Err(_) => {
                    // Producer is gone; whatever is buffered still gets drawn.
                    self.draw_slice(&mut slice, &mapper, &settings)?;
                    return Ok(FrameOutcome::Stopped);
                }
            };
            if self.shutdown.is_set() {
                return Ok(FrameOutcome::Stopped);
            }
            if sample_index == 1 {
                // recv blocks while capture is idle; the budget starts when
                // samples actually arrive, not when we began waiting.
                frame_begin = Instant::now();
            }

            slice.push(sample);
            if sample_index % samples_per_update == 0 {
                let update_begin = Instant::now();
                self.draw_slice(&mut slice, &mapper, &settings)?;
                self.pace(update_index, updates_per_second, frame_begin, update_begin);
                update_index += 1;
            }
        }

        // Tail slice when the rate does not divide evenly by the refresh
        // rate; drawn without pacing so no sample is ever skipped.
        self.draw_slice(&mut slice, &mapper, &settings)?;
        self.draw_timeline()?;
        Ok(FrameOutcome::Continue)
    }

    /// Measures the update just drawn and sleeps the remaining budget share.
    /// Overruns are reported once and never fatal; the next frame restarts
    /// the budget from its own first sample.
    fn pace(
        &mut self,
        update_index: u32,
        updates_per_second: u32,
        frame_begin: Instant,
        update_begin: Instant,
    ) {
        let remaining_updates = updates_per_second.saturating_sub(update_index);
        if remaining_updates == 0 {
            return;
        }
        let now = Instant::now();
        let average_cost = self.average.update((now - update_begin).as_secs_f64());
        let frame_cost = now - frame_begin;

        let Some(budget) = FRAME_DURATION.checked_sub(frame_cost) else {
            // A slow update should not poison the estimate for the rest of
            // the frame.
            self.average.forget();
            tracing::warn!(
                update_index,
                over_by_ms = (frame_cost - FRAME_DURATION).as_millis() as u64,
                "frame budget exceeded, skipping sleep"
            );
            return;
        };

        let interval = sleep_interval(budget, remaining_updates, average_cost);
        if interval.is_zero() {
            return;
        }
        if interval < Duration::from_millis(1) {
            tracing::debug!("sleep interval under a millisecond, consider a lower refresh rate");
        }
        self.sleeper.sleep(interval);
    }

    fn draw_slice(
        &mut self,
        slice: &mut Vec<i32>,
        mapper: &AmplitudeMapper,
        settings: &ViewerSettings,
    ) -> Result<()> {
        if slice.is_empty() {
            return Ok(());
        }
        let surface = Arc::clone(&self.surface);
        let mut surface = lock_surface(&surface)?;

        let (width, height) = surface.dimensions();
        if (width, height) != self.cursor.bounds() {
            self.cursor.resize(width, height);
            surface.clear(0, 0, width, height);
        }

        for sample in slice.drain(..) {
            if self.cursor.wrapped() {
                self.cursor.rewind();
                surface.clear(0, 0, width, height);
            }
            let offset = mapper.pixel_offset(sample, height);
            let y = (height / 2) as i32 + offset;
            if offset == 0 {
                surface.set_color(Color::Accent);
                surface.draw_point(self.cursor.x(), y);
                surface.set_color(Color::Trace);
            } else {
                surface.draw_point(self.cursor.x(), y);
            }
            self.cursor.advance(settings.horizontal_zoom, self.format.sample_rate);
        }
        Ok(())
    }

    /// Seconds since the viewer started, drawn near the bottom edge as a
    /// rolling timeline.
    fn draw_timeline(&mut self) -> Result<()> {
        let elapsed = self.started.elapsed().as_secs();
        let surface = Arc::clone(&self.surface);
        let mut surface = lock_surface(&surface)?;
        let (_, height) = surface.dimensions();
        surface.draw_label(&elapsed.to_string(), self.cursor.x(), height as i32 - 2);
        Ok(())
    }

    fn snapshot_settings(&self) -> Result<ViewerSettings> {
        self.settings
            .lock()
            .map(|guard| *guard)
            .map_err(|_| WavescopeError::msg("viewer settings lock poisoned"))
    }
}

fn lock_surface<'a>(
    surface: &'a Mutex<dyn Surface + Send + 'static>,
) -> Result<std::sync::MutexGuard<'a, dyn Surface + Send + 'static>> {
    surface
        .lock()
        .map_err(|_| WavescopeError::msg("rendering surface lock poisoned"))
}

/// Evenly spreads the remaining budget across the remaining updates and
/// discounts the predicted processing cost, flooring at zero so the loop
/// never sleeps a negative interval.
fn sleep_interval(budget: Duration, remaining_updates: u32, average_cost: f64) -> Duration {
    let raw = budget.as_secs_f64() / f64::from(remaining_updates) - average_cost;
    if raw <= 0.0 {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(raw)
    }
}
