//! Media controller abstraction

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{CastError, Result};
use crate::status::{MediaMetadata, MediaStatus};
use crate::volume::Volume;

/// Playback control for a single receiver.
///
/// This trait provides the commands the playback driver issues against a
/// device. [`ChromecastController`](crate::ChromecastController) talks to a
/// real receiver; tests substitute scripted implementations.
pub trait MediaController: Send {
    /// Load a media URL and start playing it
    fn load(&mut self, url: &str, content_type: &str, metadata: &MediaMetadata) -> Result<()>;

    /// Resume the loaded media
    fn play(&mut self) -> Result<()>;

    /// Pause the loaded media
    fn pause(&mut self) -> Result<()>;

    /// Stop the loaded media and end the media session
    fn stop(&mut self) -> Result<()>;

    /// Set the receiver volume
    fn set_volume(&mut self, volume: Volume) -> Result<()>;

    /// Read the receiver volume
    fn volume(&mut self) -> Result<Volume>;

    /// Current media status, `None` when no media session exists
    fn status(&mut self) -> Result<Option<MediaStatus>>;
}

impl<C: MediaController + ?Sized> MediaController for Box<C> {
    fn load(&mut self, url: &str, content_type: &str, metadata: &MediaMetadata) -> Result<()> {
        (**self).load(url, content_type, metadata)
    }

    fn play(&mut self) -> Result<()> {
        (**self).play()
    }

    fn pause(&mut self) -> Result<()> {
        (**self).pause()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn set_volume(&mut self, volume: Volume) -> Result<()> {
        (**self).set_volume(volume)
    }

    fn volume(&mut self) -> Result<Volume> {
        (**self).volume()
    }

    fn status(&mut self) -> Result<Option<MediaStatus>> {
        (**self).status()
    }
}

/// Block until the player reports an active state.
///
/// Polls [`MediaController::status`] every `poll` until the state is
/// `Buffering`, `Playing` or `Paused`. Status errors while waiting are
/// treated as "not yet active".
///
/// # Errors
///
/// Returns `CastError::Timeout` when `timeout` elapses first.
pub fn wait_until_active<C: MediaController + ?Sized>(
    controller: &mut C,
    timeout: Duration,
    poll: Duration,
) -> Result<MediaStatus> {
    wait_until_active_with(controller, timeout, poll, || false)
}

/// Like [`wait_until_active`], but gives up as soon as `should_abort`
/// returns true. It is checked before every status poll.
///
/// # Errors
///
/// Returns `CastError::Cancelled` when aborted and `CastError::Timeout` when
/// `timeout` elapses first.
pub fn wait_until_active_with<C, F>(
    controller: &mut C,
    timeout: Duration,
    poll: Duration,
    mut should_abort: F,
) -> Result<MediaStatus>
where
    C: MediaController + ?Sized,
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if should_abort() {
            debug!("Stopped waiting for playback to start");
            return Err(CastError::Cancelled);
        }

        match controller.status() {
            Ok(Some(status)) if status.state.is_active() => return Ok(status),
            Ok(status) => debug!("Waiting for playback to start: {:?}", status.map(|s| s.state)),
            Err(e) => debug!("Status check failed while waiting for playback: {}", e),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(CastError::Timeout(timeout));
        }
        thread::sleep(poll.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PlayerState;
    use std::collections::VecDeque;

    /// Replays a fixed sequence of statuses; the last one repeats
    struct Scripted {
        statuses: VecDeque<Result<Option<MediaStatus>>>,
        polls: usize,
    }

    impl Scripted {
        fn new(statuses: Vec<Result<Option<MediaStatus>>>) -> Self {
            Self {
                statuses: statuses.into(),
                polls: 0,
            }
        }
    }

    impl MediaController for Scripted {
        fn load(&mut self, _: &str, _: &str, _: &MediaMetadata) -> Result<()> {
            Ok(())
        }
        fn play(&mut self) -> Result<()> {
            Ok(())
        }
        fn pause(&mut self) -> Result<()> {
            Ok(())
        }
        fn stop(&mut self) -> Result<()> {
            Ok(())
        }
        fn set_volume(&mut self, _: Volume) -> Result<()> {
            Ok(())
        }
        fn volume(&mut self) -> Result<Volume> {
            Ok(Volume::default())
        }
        fn status(&mut self) -> Result<Option<MediaStatus>> {
            self.polls += 1;
            if self.statuses.len() > 1 {
                self.statuses.pop_front().unwrap_or(Ok(None))
            } else {
                match self.statuses.front() {
                    Some(Ok(status)) => Ok(status.clone()),
                    _ => Ok(None),
                }
            }
        }
    }

    #[test]
    fn test_returns_once_active() {
        let mut controller = Scripted::new(vec![
            Ok(None),
            Err(CastError::NoSession),
            Ok(Some(MediaStatus::new(PlayerState::Idle))),
            Ok(Some(MediaStatus::new(PlayerState::Buffering))),
        ]);

        let status = wait_until_active(
            &mut controller,
            Duration::from_secs(5),
            Duration::from_millis(1),
        )
        .unwrap();

        assert_eq!(status.state, PlayerState::Buffering);
        assert_eq!(controller.polls, 4);
    }

    #[test]
    fn test_times_out_when_never_active() {
        let mut controller = Scripted::new(vec![Ok(Some(MediaStatus::new(PlayerState::Idle)))]);

        let result = wait_until_active(
            &mut controller,
            Duration::from_millis(30),
            Duration::from_millis(5),
        );

        assert!(matches!(result, Err(CastError::Timeout(_))));
        assert!(controller.polls >= 2);
    }

    #[test]
    fn test_abort_stops_waiting() {
        let mut controller = Scripted::new(vec![Ok(Some(MediaStatus::new(PlayerState::Idle)))]);
        let mut checks = 0;

        let result = wait_until_active_with(
            &mut controller,
            Duration::from_secs(30),
            Duration::from_millis(1),
            || {
                checks += 1;
                checks > 3
            },
        );

        assert!(matches!(result, Err(CastError::Cancelled)));
        assert_eq!(controller.polls, 3);
    }
}
