//! Receiver-reported playback state.

/// Player state as reported by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Buffering,
    Playing,
    Paused,
}

impl PlayerState {
    /// Media is loaded on the receiver (anything but `Idle`).
    pub fn is_active(self) -> bool {
        !matches!(self, PlayerState::Idle)
    }
}

/// Why the player went idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    Finished,
    Cancelled,
    Interrupted,
    Error,
}

/// Snapshot of the current media session.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaStatus {
    pub state: PlayerState,
    pub idle_reason: Option<IdleReason>,
    /// Playback position in seconds
    pub current_time: Option<f32>,
    /// Track duration in seconds, once the receiver knows it
    pub duration: Option<f32>,
    /// URL of the loaded media
    pub content_id: Option<String>,
}

impl MediaStatus {
    pub fn new(state: PlayerState) -> Self {
        Self {
            state,
            idle_reason: None,
            current_time: None,
            duration: None,
            content_id: None,
        }
    }

    pub fn with_idle_reason(mut self, reason: IdleReason) -> Self {
        self.idle_reason = Some(reason);
        self
    }

    /// The track played to its end.
    pub fn is_finished(&self) -> bool {
        self.state == PlayerState::Idle && self.idle_reason == Some(IdleReason::Finished)
    }
}

/// Metadata shown by the receiver for a music track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl MediaMetadata {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

impl From<rust_cast::channels::media::PlayerState> for PlayerState {
    fn from(state: rust_cast::channels::media::PlayerState) -> Self {
        use rust_cast::channels::media::PlayerState as Cast;
        match state {
            Cast::Idle => PlayerState::Idle,
            Cast::Buffering => PlayerState::Buffering,
            Cast::Playing => PlayerState::Playing,
            Cast::Paused => PlayerState::Paused,
        }
    }
}

impl From<rust_cast::channels::media::IdleReason> for IdleReason {
    fn from(reason: rust_cast::channels::media::IdleReason) -> Self {
        use rust_cast::channels::media::IdleReason as Cast;
        match reason {
            Cast::Finished => IdleReason::Finished,
            Cast::Cancelled => IdleReason::Cancelled,
            Cast::Interrupted => IdleReason::Interrupted,
            Cast::Error => IdleReason::Error,
        }
    }
}

impl From<&rust_cast::channels::media::StatusEntry> for MediaStatus {
    fn from(entry: &rust_cast::channels::media::StatusEntry) -> Self {
        MediaStatus {
            state: entry.player_state.clone().into(),
            idle_reason: entry.idle_reason.clone().map(IdleReason::from),
            current_time: entry.current_time,
            duration: entry.media.as_ref().and_then(|media| media.duration),
            content_id: entry.media.as_ref().map(|media| media.content_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_requires_idle_and_reason() {
        assert!(MediaStatus::new(PlayerState::Idle)
            .with_idle_reason(IdleReason::Finished)
            .is_finished());
        assert!(!MediaStatus::new(PlayerState::Idle).is_finished());
        assert!(!MediaStatus::new(PlayerState::Idle)
            .with_idle_reason(IdleReason::Cancelled)
            .is_finished());
        assert!(!MediaStatus::new(PlayerState::Playing).is_finished());
    }

    #[test]
    fn test_active_states() {
        assert!(!PlayerState::Idle.is_active());
        assert!(PlayerState::Buffering.is_active());
        assert!(PlayerState::Playing.is_active());
        assert!(PlayerState::Paused.is_active());
    }
}
