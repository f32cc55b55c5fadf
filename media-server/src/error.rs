use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the media server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Every port of the configured range is taken
    #[error("No available port found in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    /// A path resolved outside the served root directory
    #[error("Path is outside the served directory: {0}")]
    OutsideRoot(PathBuf),

    /// The requested file does not exist or is not a regular file
    #[error("Not found: {0}")]
    NotFound(String),

    /// The root must be an existing directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The file name cannot be expressed in a URL
    #[error("Unsupported file name: {0}")]
    UnsupportedPath(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for results that can return a ServerError
pub type Result<T> = std::result::Result<T, ServerError>;
