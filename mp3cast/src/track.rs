//! Local audio tracks

use std::path::{Path, PathBuf};
use std::time::Duration;

use cast_client::MediaMetadata;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::Accessor;
use tracing::debug;

use crate::error::{PlayerError, Result};

/// File extensions accepted into a playlist.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "ogg", "flac", "wav"];

/// Whether `path` has one of the [`AUDIO_EXTENSIONS`].
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// An audio file queued for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Absolute path
    pub path: PathBuf,
    /// Tag title, or the file stem when there is none
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: Option<Duration>,
}

impl Track {
    /// Create a Track from an audio file, reading its tags when possible.
    ///
    /// Unreadable or missing tags are not an error: the title falls back to
    /// the file name.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !is_audio_file(path) {
            return Err(PlayerError::UnsupportedFile(path.to_path_buf()));
        }

        let path = path.canonicalize()?;
        if !path.is_file() {
            return Err(PlayerError::UnsupportedFile(path));
        }

        let mut track = Track::untagged(path);
        match lofty::read_from_path(&track.path) {
            Ok(tagged_file) => {
                let duration = tagged_file.properties().duration();
                if !duration.is_zero() {
                    track.duration = Some(duration);
                }

                if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
                    if let Some(title) = tag.title().filter(|t| !t.trim().is_empty()) {
                        track.title = title.to_string();
                    }
                    track.artist = tag.artist().map(|s| s.to_string());
                    track.album = tag.album().map(|s| s.to_string());
                }
            }
            Err(e) => debug!("No tags read from {}: {}", track.path.display(), e),
        }

        Ok(track)
    }

    /// A track titled after its file name.
    pub fn untagged(path: PathBuf) -> Self {
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        Track {
            path,
            title,
            artist: None,
            album: None,
            duration: None,
        }
    }

    /// "Artist - Title", or just the title.
    pub fn display_title(&self) -> String {
        match &self.artist {
            Some(artist) => format!("{} - {}", artist, self.title),
            None => self.title.clone(),
        }
    }

    /// Format duration as M:SS.
    pub fn duration_display(&self) -> Option<String> {
        self.duration.map(|d| format_seconds(d.as_secs_f32()))
    }

    pub fn content_type(&self) -> &'static str {
        media_server::content_type_for(&self.path)
    }

    pub fn metadata(&self) -> MediaMetadata {
        MediaMetadata {
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
        }
    }
}

/// Format seconds as M:SS.
pub fn format_seconds(seconds: f32) -> String {
    let secs = seconds.max(0.0) as u64;
    format!("{}:{:02}", secs / 60, secs % 60)
}
