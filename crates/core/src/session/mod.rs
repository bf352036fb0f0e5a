//! Session supervision: wires the capture and display workers together and
//! owns their lifecycle. Cancellation is cooperative; the token below and
//! the closing of the sample channel are the only cross-thread signals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::capture::{CaptureDevice, CaptureLoop};
use crate::channel::channel;
use crate::config::{AppConfig, ViewerSettings};
use crate::pacing::{FramePacer, SharedSettings, SharedSurface};
use crate::{Result, WavescopeError};

/// Cooperative cancellation token shared by every worker in a session.
/// Checked before each device read and after each sample receive.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Capability a session worker exposes. The supervisor composes the two
/// concrete workers through this seam instead of the workers sharing a base
/// type.
pub trait Task: Send + 'static {
    fn name(&self) -> &'static str;
    fn run(self: Box<Self>) -> Result<()>;
}

impl Task for CaptureLoop {
    fn name(&self) -> &'static str {
        "capture"
    }

    fn run(self: Box<Self>) -> Result<()> {
        CaptureLoop::run(*self)
    }
}

impl Task for FramePacer {
    fn name(&self) -> &'static str {
        "display"
    }

    fn run(self: Box<Self>) -> Result<()> {
        FramePacer::run(*self)
    }
}

/// A running capture-and-display session. Dropping the handle without
/// calling [`Session::stop`] detaches the workers; stopping is the orderly
/// path and reports the first worker failure.
pub struct Session {
    config: AppConfig,
    shutdown: ShutdownToken,
    settings: SharedSettings,
    workers: Vec<(&'static str, JoinHandle<Result<()>>)>,
}

impl Session {
    /// Validates the configuration and spawns both workers. The channel
    /// capacity is one second of samples, so a stalled display side costs at
    /// most a second of buffering before best-effort drops begin.
    pub fn start(
        config: AppConfig,
        device: Box<dyn CaptureDevice>,
        surface: SharedSurface,
    ) -> Result<Self> {
        config.validate()?;

        let shutdown = ShutdownToken::new();
        let settings: SharedSettings = Arc::new(Mutex::new(config.viewer));
        let (sender, receiver) = channel(config.format.sample_rate as usize);

        let capture = CaptureLoop::new(device, config.format, sender, shutdown.clone());
        let pacer = FramePacer::new(
            receiver,
            config.format,
            settings.clone(),
            surface,
            shutdown.clone(),
        );

        let workers = vec![spawn_worker(Box::new(capture))?, spawn_worker(Box::new(pacer))?];
        Ok(Self {
            config,
            shutdown,
            settings,
            workers,
        })
    }

    /// Token for external shutdown triggers such as a Ctrl-C handler.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// True once both workers have exited on their own, for example after a
    /// capture failure closed the channel.
    pub fn is_finished(&self) -> bool {
        self.workers.iter().all(|(_, handle)| handle.is_finished())
    }

    /// Swaps the viewer settings; the display loop adopts them at its next
    /// frame boundary. The capture format cannot change while running.
    pub fn update_viewer(&self, settings: ViewerSettings) -> Result<()> {
        settings.validate(self.config.format.sample_rate)?;
        let mut guard = self
            .settings
            .lock()
            .map_err(|_| WavescopeError::msg("viewer settings lock poisoned"))?;
        *guard = settings;
        Ok(())
    }

    /// Signals both workers and joins them. The capture side observes the
    /// token within one device read and drops its sender; the display side
    /// unblocks through the closed channel, so no receive timeout is needed.
    pub fn stop(self) -> Result<()> {
        self.shutdown.shutdown();
        let mut first_error = None;
        for (name, handle) in self.workers {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(worker = name, %err, "worker failed");
                    first_error.get_or_insert(err);
                }
                Err(_) => {
                    tracing::error!(worker = name, "worker panicked");
                    first_error
                        .get_or_insert_with(|| WavescopeError::msg(format!("{name} worker panicked")));
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn spawn_worker(task: Box<dyn Task>) -> Result<(&'static str, JoinHandle<Result<()>>)> {
    let name = task.name();
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || task.run())?;
    Ok((name, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ToneDevice;
    use crate::config::CaptureFormat;
    use crate::render::{Color, Surface};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingSurface {
        points: usize,
    }

    impl Surface for CountingSurface {
        fn set_color(&mut self, _color: Color) {}

        fn draw_point(&mut self, _x: i32, _y: i32) {
            self.points += 1;
        }

        fn clear(&mut self, _x: i32, _y: i32, _width: u32, _height: u32) {}

        fn draw_label(&mut self, _text: &str, _x: i32, _y: i32) {}

        fn dimensions(&self) -> (u32, u32) {
            (80, 24)
        }
    }

    #[test]
    fn start_and_stop_round_trip() {
        let config = AppConfig {
            format: CaptureFormat {
                sample_rate: 8_000,
                ..CaptureFormat::default()
            },
            ..AppConfig::default()
        };
        let surface = Arc::new(Mutex::new(CountingSurface::default()));
        let shared: SharedSurface = surface.clone();

        // Unpaced tone: the capture side floods the channel immediately, so
        // the display side has work from the first milliseconds.
        let session = Session::start(config, Box::new(ToneDevice::new(440.0)), shared).unwrap();

        std::thread::sleep(Duration::from_millis(150));
        session.stop().unwrap();

        assert!(surface.lock().unwrap().points > 0);
    }

    #[test]
    fn start_rejects_invalid_configuration() {
        let mut config = AppConfig::default();
        config.viewer.updates_per_second = 0;
        let surface: SharedSurface = Arc::new(Mutex::new(CountingSurface::default()));
        assert!(Session::start(config, Box::new(ToneDevice::new(440.0)), surface).is_err());
    }

    #[test]
    fn viewer_settings_swap_is_validated() {
        let config = AppConfig {
            format: CaptureFormat {
                sample_rate: 8_000,
                ..CaptureFormat::default()
            },
            ..AppConfig::default()
        };
        let surface: SharedSurface = Arc::new(Mutex::new(CountingSurface::default()));
        let session = Session::start(config, Box::new(ToneDevice::new(440.0)), surface).unwrap();

        let mut settings = ViewerSettings::default();
        settings.updates_per_second = 25;
        session.update_viewer(settings).unwrap();

        settings.updates_per_second = 0;
        assert!(session.update_viewer(settings).is_err());

        session.stop().unwrap();
    }
}
