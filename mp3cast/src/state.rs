//! Application state shared between the player facade and the playback driver

use cast_client::Volume;
use cast_discovery::Device;

use crate::playlist::Playlist;

/// What the receiver is doing with the playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NowPlaying {
    #[default]
    Stopped,
    /// Track sent to the receiver, waiting for playback to start
    Loading(usize),
    Playing(usize),
    Paused(usize),
}

impl NowPlaying {
    pub fn index(self) -> Option<usize> {
        match self {
            NowPlaying::Stopped => None,
            NowPlaying::Loading(index) | NowPlaying::Playing(index) | NowPlaying::Paused(index) => {
                Some(index)
            }
        }
    }
}

/// Playback position reported by the receiver, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub current: f32,
    pub duration: Option<f32>,
}

/// State owned by one [`Player`](crate::Player) and shared with its driver.
#[derive(Debug, Default)]
pub struct AppState {
    pub playlist: Playlist,
    pub device: Option<Device>,
    pub volume: Volume,
    /// Set when the user pauses or stops, so that the next idle status is
    /// not taken for the end of a track
    pub manual_control: bool,
    pub now_playing: NowPlaying,
    pub position: Option<Position>,
}

impl AppState {
    pub fn set_stopped(&mut self) {
        self.now_playing = NowPlaying::Stopped;
        self.position = None;
    }
}
