//! Core library for the Wavescope PCM waveform viewer.
//!
//! The crate captures raw PCM audio through a pluggable device seam, decodes
//! it into signed integer samples, hands them across a bounded channel to a
//! display loop that draws a fixed number of updates per one-second frame,
//! and self-corrects its pacing against measured processing cost. Each module
//! owns a distinct subsystem (decoding, hand-off, pacing, amplitude mapping,
//! capture, session supervision); windowing toolkits and device backends stay
//! outside, behind the [`Surface`] and [`CaptureDevice`] traits.

pub mod capture;
pub mod channel;
pub mod config;
pub mod decode;
pub mod error;
pub mod mapping;
pub mod pacing;
pub mod render;
pub mod session;

pub use capture::{CaptureDevice, CaptureLoop, ToneDevice};
pub use channel::{channel, ChannelClosed, SampleReceiver, SampleSender};
pub use config::{AppConfig, CaptureFormat, DisplayMode, ViewerSettings};
pub use decode::{encode_sample, DecodeError, SampleDecoder};
pub use error::{Result, WavescopeError};
pub use mapping::AmplitudeMapper;
pub use pacing::{FramePacer, RunningAverage, SharedSettings, SharedSurface};
pub use render::{Color, FrameCursor, Surface};
pub use session::{Session, ShutdownToken, Task};
