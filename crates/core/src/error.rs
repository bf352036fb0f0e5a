/// Result alias that carries the custom [`WavescopeError`] type.
pub type Result<T> = std::result::Result<T, WavescopeError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum WavescopeError {
    /// The audio input device could not be opened or stopped responding.
    /// Fatal to a capture session; surfaced to the caller instead of being
    /// retried internally.
    #[error("audio device error: {0}")]
    Device(String),
    /// A raw capture buffer could not be decoded into samples. Fatal to the
    /// session rather than silently emitting corrupt values.
    #[error(transparent)]
    Decode(#[from] crate::decode::DecodeError),
    /// Configuration failed validation before a session could start.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Catch-all for conditions without a dedicated variant, such as a
    /// poisoned lock on the shared rendering surface.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl WavescopeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a device error from the provided message.
    pub fn device<T: Into<String>>(msg: T) -> Self {
        Self::Device(msg.into())
    }
}

impl From<&str> for WavescopeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for WavescopeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
