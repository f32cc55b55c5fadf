//! Playback driver
//!
//! The driver runs on its own thread and owns the [`MediaController`] for the
//! selected device. It receives [`DriverCommand`]s, polls the receiver status
//! between commands and advances through the playlist when a track ends.
//! Everything it does is reported as a [`PlayerEvent`].

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cast_client::{
    wait_until_active_with, CastError, IdleReason, MediaController, MediaStatus, PlayerState,
    Volume,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use media_server::MediaServer;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::state::{AppState, NowPlaying, Position};

/// Status poll interval while waiting for a load to start playing
const ACTIVE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Commands accepted by the driver thread.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCommand {
    Play(usize),
    Pause,
    Resume,
    Stop,
    Next,
    Previous,
    SetVolume(Volume),
    Shutdown,
}

/// Playback events published by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    TrackStarted { index: usize, title: String },
    Paused,
    Resumed,
    Stopped,
    VolumeChanged(Volume),
    PlaylistFinished,
    Error(String),
}

/// Turns a local file into a URL the receiver can fetch.
pub trait MediaSource: Send + Sync {
    fn url_for_track(&self, path: &Path) -> media_server::Result<String>;
}

impl MediaSource for MediaServer {
    fn url_for_track(&self, path: &Path) -> media_server::Result<String> {
        self.expose(path)
    }
}

/// Handle to a running driver thread.
pub struct PlaybackDriver {
    commands: Sender<DriverCommand>,
    handle: Option<JoinHandle<()>>,
}

impl PlaybackDriver {
    /// Start a driver thread for `controller`.
    pub fn spawn<C>(
        controller: C,
        media: Arc<dyn MediaSource>,
        state: Arc<Mutex<AppState>>,
        events: Sender<PlayerEvent>,
        config: PlayerConfig,
    ) -> Result<Self>
    where
        C: MediaController + 'static,
    {
        let (commands, receiver) = crossbeam_channel::unbounded();
        let worker = Worker {
            controller,
            media,
            state,
            events,
            config,
            commands: receiver,
            pending: VecDeque::new(),
            active: false,
        };

        let handle = thread::Builder::new()
            .name("playback-driver".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            commands,
            handle: Some(handle),
        })
    }

    pub fn send(&self, command: DriverCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlayerError::DriverStopped)
    }

    /// Stop the thread and wait for it to exit.
    pub fn shutdown(self) {
        if let Some(handle) = self.retire() {
            if handle.join().is_err() {
                error!("Playback driver thread panicked");
            }
        }
    }

    /// Ask the thread to stop without waiting for it.
    ///
    /// A load in progress is abandoned at its next status check; join the
    /// returned handle to wait for the thread.
    pub fn retire(mut self) -> Option<JoinHandle<()>> {
        let _ = self.commands.send(DriverCommand::Shutdown);
        self.handle.take()
    }
}

impl Drop for PlaybackDriver {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.commands.send(DriverCommand::Shutdown);
        }
    }
}

struct Worker<C> {
    controller: C,
    media: Arc<dyn MediaSource>,
    state: Arc<Mutex<AppState>>,
    events: Sender<PlayerEvent>,
    config: PlayerConfig,
    commands: Receiver<DriverCommand>,
    /// Commands received while a load was in progress
    pending: VecDeque<DriverCommand>,
    /// The receiver has reported playback for the current track
    active: bool,
}

impl<C: MediaController> Worker<C> {
    fn run(mut self) {
        info!("Playback driver started");
        self.apply_initial_volume();

        loop {
            let next = match self.pending.pop_front() {
                Some(command) => Ok(command),
                None => self.commands.recv_timeout(self.config.poll_interval),
            };
            match next {
                Ok(DriverCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => self.poll(),
            }
        }

        info!("Playback driver stopped");
    }

    fn emit(&self, event: PlayerEvent) {
        if let PlayerEvent::Error(message) = &event {
            warn!("{}", message);
        }
        let _ = self.events.send(event);
    }

    fn apply_initial_volume(&mut self) {
        match self.config.initial_volume {
            Some(volume) => self.set_volume(volume),
            None => match self.controller.volume() {
                Ok(volume) => {
                    self.state.lock().volume = volume;
                    self.emit(PlayerEvent::VolumeChanged(volume));
                }
                Err(e) => self.emit(PlayerEvent::Error(format!("Could not read device volume: {}", e))),
            },
        }
    }

    fn handle(&mut self, command: DriverCommand) {
        debug!("Driver command: {:?}", command);
        match command {
            DriverCommand::Play(index) => self.play_index(index),
            DriverCommand::Pause => self.pause(),
            DriverCommand::Resume => self.resume(),
            DriverCommand::Stop => self.stop(),
            DriverCommand::Next => {
                let next = self.state.lock().playlist.next_index();
                match next {
                    Some(index) => self.play_index(index),
                    None => self.emit(PlayerEvent::Error("Already at the last track".to_string())),
                }
            }
            DriverCommand::Previous => {
                let previous = self.state.lock().playlist.previous_index();
                match previous {
                    Some(index) => self.play_index(index),
                    None => self.emit(PlayerEvent::Error("Nothing is playing".to_string())),
                }
            }
            DriverCommand::SetVolume(volume) => self.set_volume(volume),
            DriverCommand::Shutdown => {}
        }
    }

    fn play_index(&mut self, index: usize) {
        let track = {
            let mut state = self.state.lock();
            let selected = state.playlist.select(index).cloned();
            let track = match selected {
                Ok(track) => track,
                Err(e) => {
                    drop(state);
                    self.emit(PlayerEvent::Error(e.to_string()));
                    return;
                }
            };
            state.now_playing = NowPlaying::Loading(index);
            state.position = None;
            track
        };
        self.active = false;

        let url = match self.media.url_for_track(&track.path) {
            Ok(url) => url,
            Err(e) => {
                self.state.lock().set_stopped();
                self.emit(PlayerEvent::Error(format!("Cannot serve {}: {}", track.path.display(), e)));
                return;
            }
        };

        info!("Loading '{}' from {}", track.title, url);
        let metadata = track.metadata();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.controller.load(&url, track.content_type(), &metadata) {
                Ok(()) => break,
                Err(_) if take_interrupt(&self.commands, &mut self.pending) => {
                    self.abandon_load(&track.title);
                    return;
                }
                Err(e) if attempt < self.config.load_retries => {
                    warn!(
                        "Load attempt {}/{} for '{}' failed: {}",
                        attempt, self.config.load_retries, track.title, e
                    );
                    thread::sleep(self.config.retry_delay);
                }
                Err(e) => {
                    self.state.lock().set_stopped();
                    self.emit(PlayerEvent::Error(format!(
                        "Failed to load '{}' after {} attempts: {}",
                        track.title, attempt, e
                    )));
                    return;
                }
            }
        }

        let poll = self.config.poll_interval.min(ACTIVE_POLL_INTERVAL);
        let commands = &self.commands;
        let pending = &mut self.pending;
        let started = wait_until_active_with(
            &mut self.controller,
            self.config.load_timeout,
            poll,
            || take_interrupt(commands, pending),
        );
        match started {
            Ok(_) => {}
            Err(CastError::Cancelled) => {
                self.abandon_load(&track.title);
                return;
            }
            Err(e) => {
                self.state.lock().set_stopped();
                self.emit(PlayerEvent::Error(format!("'{}' did not start: {}", track.title, e)));
                return;
            }
        }

        self.active = true;
        {
            let mut state = self.state.lock();
            state.manual_control = false;
            state.now_playing = NowPlaying::Playing(index);
        }
        info!("Playing track {}: {}", index + 1, track.title);
        self.emit(PlayerEvent::TrackStarted {
            index,
            title: track.display_title(),
        });
    }

    /// A queued command replaces the track being loaded. The command itself
    /// reports the new state; after a shutdown the state belongs to the next
    /// driver and is left alone.
    fn abandon_load(&mut self, title: &str) {
        info!("Abandoned loading '{}'", title);
        self.active = false;
        if !self.pending.contains(&DriverCommand::Shutdown) {
            self.state.lock().set_stopped();
        }
    }

    fn pause(&mut self) {
        self.state.lock().manual_control = true;
        match self.controller.pause() {
            Ok(()) => {
                let mut state = self.state.lock();
                if let Some(index) = state.now_playing.index() {
                    state.now_playing = NowPlaying::Paused(index);
                }
                drop(state);
                self.emit(PlayerEvent::Paused);
            }
            Err(e) => self.emit(PlayerEvent::Error(format!("Pause failed: {}", e))),
        }
    }

    fn resume(&mut self) {
        match self.controller.play() {
            Ok(()) => {
                let mut state = self.state.lock();
                state.manual_control = false;
                if let Some(index) = state.now_playing.index() {
                    state.now_playing = NowPlaying::Playing(index);
                }
                drop(state);
                self.emit(PlayerEvent::Resumed);
            }
            Err(e) => self.emit(PlayerEvent::Error(format!("Resume failed: {}", e))),
        }
    }

    fn stop(&mut self) {
        self.state.lock().manual_control = true;
        self.active = false;
        if let Err(e) = self.controller.stop() {
            debug!("Stop failed: {}", e);
        }
        self.state.lock().set_stopped();
        self.emit(PlayerEvent::Stopped);
    }

    fn set_volume(&mut self, volume: Volume) {
        match self.controller.set_volume(volume) {
            Ok(()) => {
                self.state.lock().volume = volume;
                self.emit(PlayerEvent::VolumeChanged(volume));
            }
            Err(e) => self.emit(PlayerEvent::Error(format!("Volume change failed: {}", e))),
        }
    }

    fn poll(&mut self) {
        if !self.active {
            return;
        }

        match self.controller.status() {
            Ok(Some(status)) if status.state != PlayerState::Idle => self.update_position(&status),
            Ok(Some(status)) if status.is_finished() => self.on_idle(),
            Ok(Some(status)) => match status.idle_reason {
                Some(IdleReason::Cancelled) | Some(IdleReason::Interrupted) => {
                    self.on_external_stop("playback was stopped on the device")
                }
                Some(IdleReason::Error) => {
                    let title = self.current_title();
                    self.emit(PlayerEvent::Error(format!("The device could not play '{}'", title)));
                    self.on_idle();
                }
                Some(IdleReason::Finished) | None => self.on_idle(),
            },
            Ok(None) => {
                debug!("Media session ended");
                self.on_idle();
            }
            Err(CastError::AppReplaced(app)) => {
                self.on_external_stop(&format!("{} took over the device", app))
            }
            Err(e) => debug!("Status poll failed: {}", e),
        }
    }

    fn update_position(&mut self, status: &MediaStatus) {
        let mut state = self.state.lock();
        state.position = status.current_time.map(|current| Position {
            current,
            duration: status.duration,
        });
        match (status.state, state.now_playing) {
            (PlayerState::Paused, NowPlaying::Playing(index)) => {
                state.now_playing = NowPlaying::Paused(index);
            }
            (PlayerState::Playing, NowPlaying::Paused(index)) => {
                state.now_playing = NowPlaying::Playing(index);
            }
            _ => {}
        }
    }

    fn current_title(&self) -> String {
        self.state
            .lock()
            .playlist
            .current()
            .map(|track| track.display_title())
            .unwrap_or_default()
    }

    /// Someone else stopped playback. Treated like a manual stop: nothing
    /// advances and nothing is relaunched.
    fn on_external_stop(&mut self, reason: &str) {
        info!("Playback ended externally: {}", reason);
        self.active = false;
        {
            let mut state = self.state.lock();
            state.manual_control = true;
            state.set_stopped();
        }
        self.emit(PlayerEvent::Stopped);
    }

    /// The receiver went idle after playing the current track.
    fn on_idle(&mut self) {
        self.active = false;

        let next = {
            let mut state = self.state.lock();
            if state.manual_control {
                debug!("Idle after manual control, not advancing");
                state.set_stopped();
                return;
            }
            state.playlist.advance()
        };

        match next {
            Some(index) => self.play_index(index),
            None => {
                info!("Reached the end of the playlist");
                {
                    let mut state = self.state.lock();
                    state.playlist.rewind();
                    state.set_stopped();
                }
                self.emit(PlayerEvent::PlaylistFinished);
            }
        }
    }
}

/// Queue commands that arrived while a load is in progress. Returns true when
/// one of them replaces the track being loaded.
fn take_interrupt(
    commands: &Receiver<DriverCommand>,
    pending: &mut VecDeque<DriverCommand>,
) -> bool {
    loop {
        match commands.try_recv() {
            Ok(command) => pending.push_back(command),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                if !pending.contains(&DriverCommand::Shutdown) {
                    pending.push_back(DriverCommand::Shutdown);
                }
                break;
            }
        }
    }

    pending.iter().any(|command| {
        matches!(
            command,
            DriverCommand::Play(_)
                | DriverCommand::Stop
                | DriverCommand::Next
                | DriverCommand::Previous
                | DriverCommand::Shutdown
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Track;
    use cast_client::{CastError, IdleReason, MediaMetadata, MediaStatus};
    use std::path::PathBuf;
    use std::time::Instant;

    #[derive(Debug, Default)]
    struct FakeDevice {
        loads: Vec<String>,
        failing_loads: u32,
        status: Option<MediaStatus>,
        volume: Option<Volume>,
        pauses: u32,
        stops: u32,
        /// Loads are accepted but playback never starts
        stall_loads: bool,
        /// Another app holds the device
        replaced_by: Option<String>,
    }

    /// Scripted receiver: loads start playing immediately
    #[derive(Clone, Default)]
    struct FakeController {
        device: Arc<Mutex<FakeDevice>>,
    }

    impl FakeController {
        fn finish_track(&self) {
            self.device.lock().status = Some(
                MediaStatus::new(PlayerState::Idle).with_idle_reason(IdleReason::Finished),
            );
        }

        fn go_idle(&self, reason: Option<IdleReason>) {
            let mut status = MediaStatus::new(PlayerState::Idle);
            status.idle_reason = reason;
            self.device.lock().status = Some(status);
        }

        fn loads(&self) -> Vec<String> {
            self.device.lock().loads.clone()
        }
    }

    impl MediaController for FakeController {
        fn load(&mut self, url: &str, _: &str, _: &MediaMetadata) -> cast_client::Result<()> {
            let mut device = self.device.lock();
            if device.failing_loads > 0 {
                device.failing_loads -= 1;
                return Err(CastError::Load("receiver refused".to_string()));
            }
            device.loads.push(url.to_string());
            device.status = if device.stall_loads {
                None
            } else {
                Some(MediaStatus::new(PlayerState::Playing))
            };
            Ok(())
        }

        fn play(&mut self) -> cast_client::Result<()> {
            self.device.lock().status = Some(MediaStatus::new(PlayerState::Playing));
            Ok(())
        }

        fn pause(&mut self) -> cast_client::Result<()> {
            let mut device = self.device.lock();
            device.pauses += 1;
            device.status = Some(MediaStatus::new(PlayerState::Paused));
            Ok(())
        }

        fn stop(&mut self) -> cast_client::Result<()> {
            let mut device = self.device.lock();
            device.stops += 1;
            device.status = Some(
                MediaStatus::new(PlayerState::Idle).with_idle_reason(IdleReason::Cancelled),
            );
            Ok(())
        }

        fn set_volume(&mut self, volume: Volume) -> cast_client::Result<()> {
            self.device.lock().volume = Some(volume);
            Ok(())
        }

        fn volume(&mut self) -> cast_client::Result<Volume> {
            Ok(self.device.lock().volume.unwrap_or_default())
        }

        fn status(&mut self) -> cast_client::Result<Option<MediaStatus>> {
            let device = self.device.lock();
            match &device.replaced_by {
                Some(app) => Err(CastError::AppReplaced(app.clone())),
                None => Ok(device.status.clone()),
            }
        }
    }

    struct FakeMedia;

    impl MediaSource for FakeMedia {
        fn url_for_track(&self, path: &Path) -> media_server::Result<String> {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            Ok(format!("http://media.test/{}", name))
        }
    }

    struct Harness {
        fake: FakeController,
        state: Arc<Mutex<AppState>>,
        events: Receiver<PlayerEvent>,
        driver: PlaybackDriver,
    }

    fn fast_config() -> PlayerConfig {
        PlayerConfig {
            poll_interval: Duration::from_millis(10),
            load_timeout: Duration::from_millis(500),
            retry_delay: Duration::from_millis(1),
            initial_volume: Some(Volume::new(30)),
            ..Default::default()
        }
    }

    fn start(tracks: &[&str], fake: FakeController, config: PlayerConfig) -> Harness {
        let state = Arc::new(Mutex::new(AppState::default()));
        for name in tracks {
            state
                .lock()
                .playlist
                .push(Track::untagged(PathBuf::from(format!("/music/{}.mp3", name))));
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let driver = PlaybackDriver::spawn(
            fake.clone(),
            Arc::new(FakeMedia),
            Arc::clone(&state),
            tx,
            config,
        )
        .unwrap();

        let harness = Harness {
            fake,
            state,
            events: rx,
            driver,
        };
        harness.expect(|e| matches!(e, PlayerEvent::VolumeChanged(_)));
        harness
    }

    impl Harness {
        fn expect(&self, predicate: impl Fn(&PlayerEvent) -> bool) -> PlayerEvent {
            let deadline = Instant::now() + Duration::from_secs(5);
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match self.events.recv_timeout(remaining) {
                    Ok(event) if predicate(&event) => return event,
                    Ok(_) => continue,
                    Err(_) => panic!("expected event did not arrive"),
                }
            }
        }

        fn assert_quiet_for(&self, duration: Duration, predicate: impl Fn(&PlayerEvent) -> bool) {
            let deadline = Instant::now() + duration;
            while let Ok(event) = self
                .events
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            {
                assert!(!predicate(&event), "unexpected event: {:?}", event);
            }
        }
    }

    #[test]
    fn test_play_loads_track_url() {
        let h = start(&["one", "two"], FakeController::default(), fast_config());

        h.driver.send(DriverCommand::Play(1)).unwrap();
        let event = h.expect(|e| matches!(e, PlayerEvent::TrackStarted { .. }));

        assert_eq!(
            event,
            PlayerEvent::TrackStarted {
                index: 1,
                title: "two".to_string()
            }
        );
        assert_eq!(h.fake.loads(), vec!["http://media.test/two.mp3"]);
        assert_eq!(h.state.lock().now_playing, NowPlaying::Playing(1));
        assert_eq!(h.fake.device.lock().volume, Some(Volume::new(30)));
        h.driver.shutdown();
    }

    #[test]
    fn test_auto_advance_on_finish() {
        let h = start(&["one", "two"], FakeController::default(), fast_config());

        h.driver.send(DriverCommand::Play(0)).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 0, .. }));

        h.fake.finish_track();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 1, .. }));
        assert_eq!(h.state.lock().playlist.current_index(), Some(1));

        h.fake.finish_track();
        h.expect(|e| matches!(e, PlayerEvent::PlaylistFinished));
        assert_eq!(h.state.lock().now_playing, NowPlaying::Stopped);
        assert_eq!(h.fake.loads().len(), 2);

        // Finishing rewinds, so play/pause starts over from the first track
        assert_eq!(h.state.lock().playlist.current_index(), None);
        h.driver.send(DriverCommand::Next).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 0, .. }));
        h.driver.shutdown();
    }

    #[test]
    fn test_manual_stop_suppresses_advance() {
        let h = start(&["one", "two"], FakeController::default(), fast_config());

        h.driver.send(DriverCommand::Play(0)).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { .. }));

        h.driver.send(DriverCommand::Stop).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::Stopped));
        h.fake.finish_track();

        h.assert_quiet_for(Duration::from_millis(100), |e| {
            matches!(e, PlayerEvent::TrackStarted { .. } | PlayerEvent::PlaylistFinished)
        });
        assert_eq!(h.fake.loads().len(), 1);
        assert!(h.state.lock().manual_control);
        h.driver.shutdown();
    }

    #[test]
    fn test_pause_sets_manual_flag_and_resume_clears_it() {
        let h = start(&["one", "two"], FakeController::default(), fast_config());

        h.driver.send(DriverCommand::Play(0)).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { .. }));

        h.driver.send(DriverCommand::Pause).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::Paused));
        assert!(h.state.lock().manual_control);
        assert_eq!(h.state.lock().now_playing, NowPlaying::Paused(0));

        // An idle status while paused does not advance
        h.fake.finish_track();
        h.assert_quiet_for(Duration::from_millis(100), |e| {
            matches!(e, PlayerEvent::TrackStarted { .. })
        });

        h.driver.send(DriverCommand::Play(0)).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 0, .. }));
        h.driver.send(DriverCommand::Pause).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::Paused));
        h.driver.send(DriverCommand::Resume).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::Resumed));
        assert!(!h.state.lock().manual_control);
        assert_eq!(h.state.lock().now_playing, NowPlaying::Playing(0));
        h.driver.shutdown();
    }

    #[test]
    fn test_load_retries_then_succeeds() {
        let fake = FakeController::default();
        fake.device.lock().failing_loads = 2;
        let h = start(&["one"], fake, fast_config());

        h.driver.send(DriverCommand::Play(0)).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { .. }));
        assert_eq!(h.fake.loads().len(), 1);
        assert_eq!(h.fake.device.lock().failing_loads, 0);
        h.driver.shutdown();
    }

    #[test]
    fn test_load_gives_up_after_retries() {
        let fake = FakeController::default();
        fake.device.lock().failing_loads = 10;
        let h = start(&["one"], fake, fast_config());

        h.driver.send(DriverCommand::Play(0)).unwrap();
        let event = h.expect(|e| matches!(e, PlayerEvent::Error(_)));

        assert!(matches!(event, PlayerEvent::Error(msg) if msg.contains("after 3 attempts")));
        assert_eq!(h.fake.device.lock().failing_loads, 7);
        assert_eq!(h.state.lock().now_playing, NowPlaying::Stopped);
        h.driver.shutdown();
    }

    #[test]
    fn test_next_and_previous() {
        let h = start(&["one", "two", "three"], FakeController::default(), fast_config());

        h.driver.send(DriverCommand::Next).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 0, .. }));
        h.driver.send(DriverCommand::Next).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 1, .. }));
        h.driver.send(DriverCommand::Previous).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 0, .. }));
        h.driver.shutdown();
    }

    #[test]
    fn test_invalid_index_reports_error() {
        let h = start(&["one"], FakeController::default(), fast_config());

        h.driver.send(DriverCommand::Play(5)).unwrap();
        let event = h.expect(|e| matches!(e, PlayerEvent::Error(_)));
        assert!(matches!(event, PlayerEvent::Error(msg) if msg.contains("out of range")));
        assert!(h.fake.loads().is_empty());
        h.driver.shutdown();
    }

    #[test]
    fn test_set_volume() {
        let h = start(&["one"], FakeController::default(), fast_config());

        h.driver.send(DriverCommand::SetVolume(Volume::new(80))).unwrap();
        let event = h.expect(|e| matches!(e, PlayerEvent::VolumeChanged(_)));

        assert_eq!(event, PlayerEvent::VolumeChanged(Volume::new(80)));
        assert_eq!(h.state.lock().volume, Volume::new(80));
        assert_eq!(h.fake.device.lock().volume, Some(Volume::new(80)));
        h.driver.shutdown();
    }

    #[test]
    fn test_reads_device_volume_without_initial_volume() {
        let fake = FakeController::default();
        fake.device.lock().volume = Some(Volume::new(65));
        let config = PlayerConfig {
            initial_volume: None,
            ..fast_config()
        };
        let h = start(&["one"], fake, config);

        assert_eq!(h.state.lock().volume, Volume::new(65));
        h.driver.shutdown();
    }

    #[test]
    fn test_next_at_last_track_keeps_playing() {
        let h = start(&["one", "two"], FakeController::default(), fast_config());

        h.driver.send(DriverCommand::Play(1)).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 1, .. }));

        h.driver.send(DriverCommand::Next).unwrap();
        let event = h.expect(|e| matches!(e, PlayerEvent::Error(_)));
        assert!(matches!(event, PlayerEvent::Error(msg) if msg.contains("last track")));
        assert_eq!(h.state.lock().now_playing, NowPlaying::Playing(1));
        assert_eq!(h.fake.loads().len(), 1);
        h.driver.shutdown();
    }

    #[test]
    fn test_previous_on_first_track_replays_it() {
        let h = start(&["one", "two"], FakeController::default(), fast_config());

        h.driver.send(DriverCommand::Play(0)).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 0, .. }));
        h.driver.send(DriverCommand::Previous).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 0, .. }));

        assert_eq!(
            h.fake.loads(),
            vec!["http://media.test/one.mp3", "http://media.test/one.mp3"]
        );
        h.driver.shutdown();
    }

    #[test]
    fn test_vanished_session_advances() {
        let h = start(&["one", "two"], FakeController::default(), fast_config());

        h.driver.send(DriverCommand::Play(0)).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 0, .. }));

        h.fake.device.lock().status = None;
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 1, .. }));
        assert_eq!(h.fake.loads().len(), 2);
        h.driver.shutdown();
    }

    #[test]
    fn test_stop_from_another_sender_does_not_advance() {
        for reason in [IdleReason::Cancelled, IdleReason::Interrupted] {
            let h = start(&["one", "two"], FakeController::default(), fast_config());

            h.driver.send(DriverCommand::Play(0)).unwrap();
            h.expect(|e| matches!(e, PlayerEvent::TrackStarted { .. }));

            h.fake.go_idle(Some(reason));
            h.expect(|e| matches!(e, PlayerEvent::Stopped));
            h.assert_quiet_for(Duration::from_millis(100), |e| {
                matches!(e, PlayerEvent::TrackStarted { .. })
            });
            assert_eq!(h.fake.loads().len(), 1);
            assert!(h.state.lock().manual_control);
            h.driver.shutdown();
        }
    }

    #[test]
    fn test_receiver_error_reports_and_advances() {
        let h = start(&["one", "two"], FakeController::default(), fast_config());

        h.driver.send(DriverCommand::Play(0)).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 0, .. }));

        h.fake.go_idle(Some(IdleReason::Error));
        let event = h.expect(|e| matches!(e, PlayerEvent::Error(_)));
        assert!(matches!(event, PlayerEvent::Error(msg) if msg.contains("'one'")));
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 1, .. }));
        h.driver.shutdown();
    }

    #[test]
    fn test_other_app_taking_over_stops_playback() {
        let h = start(&["one", "two"], FakeController::default(), fast_config());

        h.driver.send(DriverCommand::Play(0)).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { .. }));

        h.fake.device.lock().replaced_by = Some("Spotify".to_string());
        h.expect(|e| matches!(e, PlayerEvent::Stopped));

        // The other app going away later does not bring the playlist back
        h.fake.device.lock().replaced_by = None;
        h.fake.go_idle(None);
        h.assert_quiet_for(Duration::from_millis(100), |e| {
            matches!(e, PlayerEvent::TrackStarted { .. })
        });
        assert_eq!(h.fake.loads().len(), 1);
        assert_eq!(h.state.lock().now_playing, NowPlaying::Stopped);
        h.driver.shutdown();
    }

    fn stalled_config() -> PlayerConfig {
        PlayerConfig {
            load_timeout: Duration::from_secs(30),
            ..fast_config()
        }
    }

    fn wait_until_loading(h: &Harness) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !matches!(h.state.lock().now_playing, NowPlaying::Loading(_)) {
            assert!(Instant::now() < deadline, "track never started loading");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_stop_interrupts_a_stalled_load() {
        let fake = FakeController::default();
        fake.device.lock().stall_loads = true;
        let h = start(&["one", "two"], fake, stalled_config());

        h.driver.send(DriverCommand::Play(0)).unwrap();
        wait_until_loading(&h);

        let started = Instant::now();
        h.driver.send(DriverCommand::Stop).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::Stopped));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(h.state.lock().now_playing, NowPlaying::Stopped);
        assert_eq!(h.fake.device.lock().stops, 1);
        h.driver.shutdown();
    }

    #[test]
    fn test_play_replaces_a_stalled_load() {
        let fake = FakeController::default();
        fake.device.lock().stall_loads = true;
        let h = start(&["one", "two"], fake, stalled_config());

        h.driver.send(DriverCommand::Play(0)).unwrap();
        wait_until_loading(&h);

        h.fake.device.lock().stall_loads = false;
        h.driver.send(DriverCommand::Play(1)).unwrap();
        h.expect(|e| matches!(e, PlayerEvent::TrackStarted { index: 1, .. }));
        assert_eq!(
            h.fake.loads(),
            vec!["http://media.test/one.mp3", "http://media.test/two.mp3"]
        );
        h.driver.shutdown();
    }

    #[test]
    fn test_retire_returns_while_loading() {
        let fake = FakeController::default();
        fake.device.lock().stall_loads = true;
        let h = start(&["one"], fake, stalled_config());

        h.driver.send(DriverCommand::Play(0)).unwrap();
        wait_until_loading(&h);

        let handle = h.driver.retire().expect("driver thread handle");
        let started = Instant::now();
        handle.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        // A retired driver leaves the shared state to its successor
        assert_eq!(h.state.lock().now_playing, NowPlaying::Loading(0));
        assert!(h.events.try_iter().all(|e| !matches!(e, PlayerEvent::Error(_))));
    }
}
