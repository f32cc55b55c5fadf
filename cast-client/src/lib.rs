//! Cast v2 media control for Chromecast and Google Home receivers
//!
//! This crate wraps `rust_cast` behind the [`MediaController`] trait, the
//! handful of commands needed to play audio files served from the LAN:
//! load a URL, play, pause, stop, volume and status.
//!
//! # Example
//!
//! ```no_run
//! use cast_client::{ChromecastController, MediaController, MediaMetadata, Volume};
//! use std::time::Duration;
//!
//! let mut controller = ChromecastController::new("192.168.1.50", 8009);
//! controller.load(
//!     "http://192.168.1.10:8000/song.mp3",
//!     "audio/mpeg",
//!     &MediaMetadata::titled("Song"),
//! )?;
//! cast_client::wait_until_active(&mut controller, Duration::from_secs(20), Duration::from_millis(500))?;
//! controller.set_volume(Volume::new(40))?;
//! # Ok::<(), cast_client::CastError>(())
//! ```

mod chromecast;
mod controller;
mod error;
mod status;
mod volume;

pub use chromecast::{ChromecastController, DEFAULT_MEDIA_RECEIVER_ID};
pub use controller::{wait_until_active, wait_until_active_with, MediaController};
pub use error::{CastError, Result};
pub use status::{IdleReason, MediaMetadata, MediaStatus, PlayerState};
pub use volume::Volume;
