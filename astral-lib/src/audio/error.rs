//! Error types for decoding and output.

use std::fmt;

/// Errors produced while opening the output or decoding clips.
#[derive(Debug)]
pub enum AudioError {
    /// The output device could not be opened.
    Device(String),
    /// The clip bytes could not be decoded.
    Decode(String),
    /// The clip container or codec is not supported.
    Unsupported(String),
    /// Decoding succeeded but produced no samples.
    EmptyClip,
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(err) => write!(f, "output device error: {}", err),
            Self::Decode(err) => write!(f, "decode error: {}", err),
            Self::Unsupported(err) => write!(f, "unsupported clip: {}", err),
            Self::EmptyClip => write!(f, "clip contains no audio"),
        }
    }
}

impl std::error::Error for AudioError {}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error;
        match err {
            Error::Unsupported(what) => Self::Unsupported(what.to_string()),
            other => Self::Decode(other.to_string()),
        }
    }
}
