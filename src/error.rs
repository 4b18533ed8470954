//! Error types

use thiserror::Error;

/// Rejected session commands. Raised before any background work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("channel list is empty")]
    EmptyChannelList,
    #[error("channel index {index} out of range (0..{len})")]
    ChannelOutOfRange { index: usize, len: usize },
    #[error("source index {index} out of range (0..{len})")]
    SourceOutOfRange { index: usize, len: usize },
    #[error("channel {index} has no sources")]
    NoSources { index: usize },
    #[error("no channel is loaded")]
    NoActiveChannel,
    #[error("current channel does not support seeking")]
    NotSeekable,
    #[error("playback engine cannot pause")]
    PauseUnsupported,
}

/// A single HTTP request that did not produce a response
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<ureq::Error> for TransportError {
    fn from(e: ureq::Error) -> Self {
        TransportError::Request(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("request failed: {0}")]
    Request(#[from] ureq::Error),
    #[error("HTTP error: {0}")]
    Http(u16),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("playlist has no playable entries")]
    Empty,
}
