//! Error types for the Cast client

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while controlling a Cast receiver
#[derive(Debug, Error)]
pub enum CastError {
    /// TLS connection or virtual channel setup failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// The Default Media Receiver app could not be launched
    #[error("Failed to launch media receiver: {0}")]
    Launch(String),

    /// The receiver refused or failed to load the media URL
    #[error("Failed to load media: {0}")]
    Load(String),

    /// A playback or volume command failed
    #[error("Command failed: {0}")]
    Command(String),

    /// No media session is active on the receiver
    #[error("No active media session")]
    NoSession,

    /// The player did not become active in time
    #[error("Timed out after {0:?} waiting for playback to start")]
    Timeout(Duration),

    /// Waiting for playback was abandoned by the caller
    #[error("Cancelled while waiting for playback to start")]
    Cancelled,

    /// Another app took over the receiver
    #[error("{0} took over the device")]
    AppReplaced(String),
}

/// Type alias for results that can return a CastError
pub type Result<T> = std::result::Result<T, CastError>;
