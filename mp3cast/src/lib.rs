//! # mp3cast - play local audio files on Cast speakers
//!
//! Builds a playlist from local files, serves it over HTTP on the LAN and
//! drives a Chromecast or Google Home receiver through it:
//!
//! ```rust,no_run
//! use mp3cast::{Player, PlayerConfig, PlayerEvent};
//!
//! fn main() -> Result<(), mp3cast::PlayerError> {
//!     let mut player = Player::new(PlayerConfig::default())?;
//!     player.discover()?;
//!     player.select_device("Living Room speaker")?;
//!
//!     player.add_files(["/home/me/Music/song.mp3"]);
//!     player.play(0)?;
//!
//!     for event in player.events().iter() {
//!         if event == PlayerEvent::PlaylistFinished {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! mp3cast (Player facade, TUI / CLI)
//!     ↓
//! PlaybackDriver (worker thread: load, poll, auto-advance)
//!     ↓                         ↓
//! cast-client (Cast v2)     media-server (LAN file server)
//!
//! cast-discovery (mDNS) feeds the device list
//! ```
//!
//! The driver advances to the next track when the receiver goes idle after
//! playing, unless the user paused or stopped playback.

// Main exports
pub use config::PlayerConfig;
pub use driver::{DriverCommand, MediaSource, PlaybackDriver, PlayerEvent};
pub use error::{PlayerError, Result};
pub use player::{Player, PlayerSnapshot};
pub use playlist::{AddReport, Playlist};
pub use state::{AppState, NowPlaying, Position};
pub use track::Track;

// Re-export commonly used types from the member crates
pub use cast_client::Volume;
pub use cast_discovery::Device;

pub mod logging;
pub mod track;

mod config;
mod driver;
mod error;
mod player;
mod playlist;
mod state;
