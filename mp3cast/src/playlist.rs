//! Ordered track list with a bounded cursor

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PlayerError, Result};
use crate::track::{is_audio_file, Track};

/// Result of adding paths to a playlist.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AddReport {
    /// Number of tracks appended
    pub added: usize,
    /// Paths that were not audio files or could not be read
    pub rejected: Vec<PathBuf>,
}

impl AddReport {
    fn merge(&mut self, other: AddReport) {
        self.added += other.added;
        self.rejected.extend(other.rejected);
    }
}

/// Ordered list of tracks and the index of the current one.
///
/// The current index, when set, is always a valid position.
#[derive(Debug, Default, Clone)]
pub struct Playlist {
    tracks: Vec<Track>,
    current: Option<usize>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an audio file, or every audio file of a directory sorted by name.
    pub fn add(&mut self, path: impl AsRef<Path>) -> AddReport {
        let path = path.as_ref();
        let mut report = AddReport::default();

        if path.is_dir() {
            let entries = match std::fs::read_dir(path) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Cannot read directory {}: {}", path.display(), e);
                    report.rejected.push(path.to_path_buf());
                    return report;
                }
            };

            let mut files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|p| p.is_file() && is_audio_file(p))
                .collect();
            files.sort_by_key(|p| p.file_name().map(|name| name.to_ascii_lowercase()));

            for file in files {
                report.merge(self.add_file(&file));
            }
            return report;
        }

        self.add_file(path)
    }

    pub fn add_many<I, P>(&mut self, paths: I) -> AddReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut report = AddReport::default();
        for path in paths {
            report.merge(self.add(path));
        }
        report
    }

    fn add_file(&mut self, path: &Path) -> AddReport {
        match Track::from_path(path) {
            Ok(track) => {
                self.push(track);
                AddReport {
                    added: 1,
                    rejected: Vec::new(),
                }
            }
            Err(e) => {
                debug!("Rejected {}: {}", path.display(), e);
                AddReport {
                    added: 0,
                    rejected: vec![path.to_path_buf()],
                }
            }
        }
    }

    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Make `index` the current track.
    pub fn select(&mut self, index: usize) -> Result<&Track> {
        if index >= self.tracks.len() {
            return Err(PlayerError::IndexOutOfRange {
                index,
                len: self.tracks.len(),
            });
        }
        self.current = Some(index);
        Ok(&self.tracks[index])
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|index| self.tracks.get(index))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Index after the current one, without moving.
    ///
    /// With no current track this is the first track.
    pub fn next_index(&self) -> Option<usize> {
        let next = self.current.map_or(0, |index| index + 1);
        (next < self.tracks.len()).then_some(next)
    }

    /// Index before the current one, without moving. Stays on the first track.
    pub fn previous_index(&self) -> Option<usize> {
        self.current.map(|index| index.saturating_sub(1))
    }

    /// Move to the next track. Returns `None` at the end; there is no wrap-around.
    pub fn advance(&mut self) -> Option<usize> {
        let next = self.next_index()?;
        self.current = Some(next);
        Some(next)
    }

    /// Move to the previous track.
    pub fn previous(&mut self) -> Option<usize> {
        let previous = self.previous_index()?;
        self.current = Some(previous);
        Some(previous)
    }

    /// Forget the current track, keeping the list. The next
    /// [`advance`](Self::advance) starts from the first track again.
    pub fn rewind(&mut self) {
        self.current = None;
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = None;
    }

    /// Remove a track, keeping the current index on a valid track.
    pub fn remove(&mut self, index: usize) -> Result<Track> {
        if index >= self.tracks.len() {
            return Err(PlayerError::IndexOutOfRange {
                index,
                len: self.tracks.len(),
            });
        }

        let track = self.tracks.remove(index);
        self.current = match self.current {
            _ if self.tracks.is_empty() => None,
            Some(current) if index < current => Some(current - 1),
            Some(current) => Some(current.min(self.tracks.len() - 1)),
            None => None,
        };
        Ok(track)
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }
}
