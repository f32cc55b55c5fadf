//! LAN file server for Cast receivers.
//!
//! A Cast receiver plays media by fetching a URL itself, so local files have to
//! be exposed over HTTP on an address the receiver can reach. This crate
//! provides a small static file server built for that job.
//!
//! # Overview
//!
//! - [`MediaServer`]: binds the first free port of a range, detects the LAN
//!   address used for outbound traffic and serves files from a root directory.
//! - [`MediaRoot`]: the confinement rule. Every request path is decoded,
//!   resolved and canonicalized; anything that ends up outside the root
//!   (`..` segments, encoded slashes, symlinks) is answered with 404.
//! - [`range`]: `Range: bytes=` handling so receivers can seek.
//!
//! The root can be moved at runtime with [`MediaServer::set_root`], which is how
//! a playlist with files from several directories is served: the server is
//! re-rooted at the directory of each track before it is loaded.
//!
//! # Example
//!
//! ```no_run
//! use media_server::MediaServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), media_server::ServerError> {
//!     let server = MediaServer::new((8000, 8100), "/home/me/Music").await?;
//!     let url = server.url_for("/home/me/Music/song.mp3")?;
//!     println!("Receivers can fetch {}", url);
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

mod error;
pub mod range;
pub mod resolve;
mod server;

pub use error::{Result, ServerError};
pub use resolve::{content_type_for, MediaRoot};
pub use server::MediaServer;

/// Default port range: a fixed starting port with fallback to the following ones.
pub const DEFAULT_PORT_RANGE: (u16, u16) = (8000, 8100);
