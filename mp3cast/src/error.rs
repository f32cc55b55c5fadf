use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Media server error: {0}")]
    Server(#[from] media_server::ServerError),

    #[error("Cast error: {0}")]
    Cast(#[from] cast_client::CastError),

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("No device selected")]
    NoDeviceSelected,

    #[error("Playlist is empty")]
    EmptyPlaylist,

    #[error("Track {index} is out of range (playlist has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Not an audio file: {0}")]
    UnsupportedFile(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Still loading the track, try again once it plays")]
    StillLoading,

    #[error("Playback driver has stopped")]
    DriverStopped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
