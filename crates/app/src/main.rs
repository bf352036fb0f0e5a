use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use wavescope_core::{
    AppConfig, CaptureDevice, DisplayMode, Session, SharedSurface, ToneDevice, WavescopeError,
};

mod device;
mod term;

fn main() -> wavescope_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Live { device_name, options } => {
            let config = options.resolve()?;
            run_session(config, Box::new(device::CpalDevice::new(device_name)))
        }
        Commands::Tone { frequency, options } => {
            let config = options.resolve()?;
            run_session(config, Box::new(ToneDevice::new(frequency).paced(true)))
        }
        Commands::Devices => list_devices(),
    }
}

fn run_session(config: AppConfig, device: Box<dyn CaptureDevice>) -> wavescope_core::Result<()> {
    tracing::info!(
        sample_rate = config.format.sample_rate,
        bits = config.format.bits_per_sample,
        updates = config.viewer.updates_per_second,
        "starting session"
    );

    let surface: SharedSurface = Arc::new(Mutex::new(term::TermSurface::from_env()));
    let session = Session::start(config, device, surface)?;

    let token = session.shutdown_token();
    let handler_token = token.clone();
    ctrlc::set_handler(move || handler_token.shutdown())
        .map_err(|err| WavescopeError::msg(format!("failed to install Ctrl-C handler: {err}")))?;

    tracing::info!("session running, press Ctrl-C to stop");
    while !token.is_set() && !session.is_finished() {
        std::thread::sleep(Duration::from_millis(100));
    }
    session.stop()
}

fn list_devices() -> wavescope_core::Result<()> {
    let names = device::list_input_devices()?;
    if names.is_empty() {
        println!("no audio input devices found");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time PCM waveform viewer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture from an audio input device and draw the waveform.
    Live {
        /// Input device name; the host default when omitted.
        #[arg(short, long = "device")]
        device_name: Option<String>,
        #[command(flatten)]
        options: ConfigOptions,
    },
    /// Draw a synthetic sine tone; no audio hardware required.
    Tone {
        /// Tone frequency in hertz.
        #[arg(short, long, default_value_t = 440.0)]
        frequency: f64,
        #[command(flatten)]
        options: ConfigOptions,
    },
    /// List the available audio input devices.
    Devices,
}

#[derive(Args, Debug)]
struct ConfigOptions {
    /// JSON preset to start from; the flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Sample rate in hertz (8000, 44100, 48000 or 96000).
    #[arg(long)]
    sample_rate: Option<u32>,
    /// Sample width in bits (8, 16 or 24).
    #[arg(long)]
    bits: Option<u8>,
    /// Number of interleaved channels.
    #[arg(long)]
    channels: Option<u16>,
    /// Most-significant byte first on the wire.
    #[arg(long)]
    big_endian: Option<bool>,
    /// Viewer refresh rate in updates per second.
    #[arg(long)]
    updates: Option<u32>,
    /// Amplitude companding for the vertical axis.
    #[arg(long, value_enum)]
    display: Option<DisplayArg>,
    /// Horizontal pixels covered by one second of audio.
    #[arg(long)]
    horizontal_zoom: Option<f32>,
    /// Vertical zoom multiplier.
    #[arg(long)]
    vertical_zoom: Option<f32>,
}

impl ConfigOptions {
    /// Builds the session configuration: preset (or defaults) first, then
    /// explicit flags, validated as a whole.
    fn resolve(&self) -> wavescope_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::live_defaults(),
        };
        if let Some(sample_rate) = self.sample_rate {
            config.format.sample_rate = sample_rate;
        }
        if let Some(bits) = self.bits {
            config.format.bits_per_sample = bits;
        }
        if let Some(channels) = self.channels {
            config.format.channels = channels;
        }
        if let Some(big_endian) = self.big_endian {
            config.format.big_endian = big_endian;
        }
        if let Some(updates) = self.updates {
            config.viewer.updates_per_second = updates;
        }
        if let Some(display) = self.display {
            config.viewer.display_mode = display.into();
        }
        if let Some(zoom) = self.horizontal_zoom {
            config.viewer.horizontal_zoom = zoom;
        }
        if let Some(zoom) = self.vertical_zoom {
            config.viewer.vertical_zoom = zoom;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DisplayArg {
    Linear,
    Log,
}

impl From<DisplayArg> for DisplayMode {
    fn from(value: DisplayArg) -> Self {
        match value {
            DisplayArg::Linear => DisplayMode::Linear,
            DisplayArg::Log => DisplayMode::Log,
        }
    }
}
