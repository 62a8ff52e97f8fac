//! Error types for the session connection, HTTP collaborator and cache store.

use std::fmt;

#[derive(Debug)]
pub enum SessionError {
    /// The WebSocket transport failed.
    Transport(tokio_tungstenite::tungstenite::Error),
    /// A frame or response body was not valid JSON for its type.
    Protocol(serde_json::Error),
    /// The campaign HTTP endpoints failed.
    Http(reqwest::Error),
    /// An audio payload was not valid base64.
    AudioPayload(base64::DecodeError),
    Io(std::io::Error),
    /// A send was attempted without an open connection.
    NotConnected,
    /// A roll was acknowledged with no roll pending.
    NoPendingRoll,
    InvalidUrl(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport error: {}", err),
            Self::Protocol(err) => write!(f, "protocol error: {}", err),
            Self::Http(err) => write!(f, "http error: {}", err),
            Self::AudioPayload(err) => write!(f, "invalid audio payload: {}", err),
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::NotConnected => write!(f, "not connected to a session"),
            Self::NoPendingRoll => write!(f, "no roll is pending"),
            Self::InvalidUrl(url) => write!(f, "invalid server url: {}", url),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::Protocol(err) => Some(err),
            Self::Http(err) => Some(err),
            Self::AudioPayload(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err)
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl From<base64::DecodeError> for SessionError {
    fn from(err: base64::DecodeError) -> Self {
        Self::AudioPayload(err)
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
