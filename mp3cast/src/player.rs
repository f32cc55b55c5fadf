//! Player - main entry point
//!
//! Ties discovery, the media server and the playback driver together behind a
//! synchronous API. The UI talks only to [`Player`] and renders from
//! [`Player::snapshot`].

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cast_client::{ChromecastController, MediaController, Volume};
use cast_discovery::Device;
use crossbeam_channel::{Receiver, Sender};
use media_server::MediaServer;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::PlayerConfig;
use crate::driver::{DriverCommand, MediaSource, PlaybackDriver, PlayerEvent};
use crate::error::{PlayerError, Result};
use crate::playlist::AddReport;
use crate::state::{AppState, NowPlaying, Position};

/// Everything the UI needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub devices: Vec<String>,
    pub device: Option<String>,
    pub tracks: Vec<String>,
    pub current: Option<usize>,
    pub now_playing: NowPlaying,
    pub volume: Volume,
    pub position: Option<Position>,
    pub server_url: String,
}

/// Plays a local playlist on one Cast device at a time.
///
/// # Example
///
/// ```rust,no_run
/// use mp3cast::{Player, PlayerConfig};
///
/// fn main() -> Result<(), mp3cast::PlayerError> {
///     let mut player = Player::new(PlayerConfig::default())?;
///
///     let names = player.discover()?;
///     println!("Found: {:?}", names);
///
///     player.select_device("Kitchen speaker")?;
///     player.add_files(["/home/me/Music/album"]);
///     player.play(0)?;
///
///     for event in player.events().iter() {
///         println!("{:?}", event);
///     }
///     Ok(())
/// }
/// ```
pub struct Player {
    config: PlayerConfig,
    state: Arc<Mutex<AppState>>,
    devices: Vec<Device>,
    driver: Option<PlaybackDriver>,
    /// Drivers of previously selected devices that are still winding down
    retired: Vec<JoinHandle<()>>,
    events_tx: Sender<PlayerEvent>,
    events_rx: Receiver<PlayerEvent>,
    server: Arc<MediaServer>,
    /// Runs the media server; dropped last
    runtime: tokio::runtime::Runtime,
}

impl Player {
    /// Create a player and start its media server.
    ///
    /// The server initially serves the current directory; it is re-rooted at
    /// each track's directory before the track is loaded.
    pub fn new(config: PlayerConfig) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("mp3cast-http")
            .enable_all()
            .build()?;

        let root = std::env::current_dir()?;
        let server = runtime.block_on(MediaServer::new(config.port_range, &root))?;
        info!("Media server ready at {}", server.base_url());

        let state = AppState {
            volume: config.initial_volume.unwrap_or_default(),
            ..Default::default()
        };
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        Ok(Self {
            config,
            state: Arc::new(Mutex::new(state)),
            devices: Vec::new(),
            driver: None,
            retired: Vec::new(),
            events_tx,
            events_rx,
            server: Arc::new(server),
            runtime,
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Browse for devices on a background thread.
    ///
    /// The result arrives on the returned channel once the discovery timeout
    /// has elapsed; hand it to [`Player::set_devices`].
    pub fn start_discovery(&self) -> Receiver<Result<Vec<Device>>> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let timeout = self.config.discovery_timeout;

        let spawned = thread::Builder::new()
            .name("cast-discovery".to_string())
            .spawn(move || {
                let result = cast_discovery::try_get_with_timeout(timeout)
                    .map_err(|e| PlayerError::Discovery(e.to_string()));
                match &result {
                    Ok(devices) => info!("Discovery finished: {} device(s)", devices.len()),
                    Err(e) => warn!("{}", e),
                }
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            warn!("Failed to start discovery thread: {}", e);
        }

        rx
    }

    /// Discover devices and wait for the result. Returns the device names.
    pub fn discover(&mut self) -> Result<Vec<String>> {
        let devices = self
            .start_discovery()
            .recv()
            .map_err(|_| PlayerError::Discovery("discovery thread exited".to_string()))??;
        self.set_devices(devices);
        Ok(self.device_names())
    }

    pub fn set_devices(&mut self, mut devices: Vec<Device>) {
        devices.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        self.devices = devices;
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device_names(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.name.clone()).collect()
    }

    /// Select a discovered device by name (case-insensitive) and start
    /// driving it.
    pub fn select_device(&mut self, name: &str) -> Result<()> {
        let device = self
            .devices
            .iter()
            .find(|device| device.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| PlayerError::DeviceNotFound(name.to_string()))?;

        if let Ok(ip) = device.ip_address.parse::<IpAddr>() {
            if let Some(local_ip) = MediaServer::local_ip_for(ip) {
                debug!("Advertising media server as {} for {}", local_ip, device.name);
                self.server.set_advertised_ip(local_ip);
            }
        }

        let controller = ChromecastController::new(device.ip_address.clone(), device.port);
        self.connect_with(device, controller)
    }

    /// Drive `device` through `controller`, replacing any previous driver.
    pub fn connect_with<C>(&mut self, device: Device, controller: C) -> Result<()>
    where
        C: MediaController + 'static,
    {
        self.retired.retain(|handle| !handle.is_finished());
        if let Some(handle) = self.driver.take().and_then(PlaybackDriver::retire) {
            self.retired.push(handle);
        }

        info!(
            "Selected {} ({}) at {}:{}",
            device.name, device.model_name, device.ip_address, device.port
        );
        {
            let mut state = self.state.lock();
            state.device = Some(device);
            state.manual_control = false;
            state.set_stopped();
        }

        // Once a volume has been chosen, every device gets the current one
        let mut config = self.config.clone();
        if config.initial_volume.is_some() {
            config.initial_volume = Some(self.state.lock().volume);
        }

        let driver = PlaybackDriver::spawn(
            controller,
            Arc::clone(&self.server) as Arc<dyn MediaSource>,
            Arc::clone(&self.state),
            self.events_tx.clone(),
            config,
        )?;
        self.driver = Some(driver);
        Ok(())
    }

    pub fn add_files<I, P>(&mut self, paths: I) -> AddReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let report = self.state.lock().playlist.add_many(paths);
        info!(
            "Added {} track(s), rejected {}",
            report.added,
            report.rejected.len()
        );
        report
    }

    /// Stop playback and empty the playlist.
    pub fn clear_playlist(&mut self) {
        let playing = self.state.lock().now_playing != NowPlaying::Stopped;
        if playing {
            let _ = self.stop();
        }
        self.state.lock().playlist.clear();
    }

    /// Play the track at `index`.
    pub fn play(&self, index: usize) -> Result<()> {
        let driver = self.driver()?;
        {
            let state = self.state.lock();
            if state.playlist.is_empty() {
                return Err(PlayerError::EmptyPlaylist);
            }
            if index >= state.playlist.len() {
                return Err(PlayerError::IndexOutOfRange {
                    index,
                    len: state.playlist.len(),
                });
            }
        }
        driver.send(DriverCommand::Play(index))
    }

    /// Pause when playing, resume when paused, otherwise start the current
    /// (or first) track.
    ///
    /// Returns [`PlayerError::StillLoading`] while a track is loading; use
    /// [`Player::stop`] to abandon the load.
    pub fn toggle_pause(&self) -> Result<()> {
        let driver = self.driver()?;
        let (now_playing, current) = {
            let mut state = self.state.lock();
            if matches!(state.now_playing, NowPlaying::Playing(_)) {
                state.manual_control = true;
            }
            (state.now_playing, state.playlist.current_index())
        };

        match now_playing {
            NowPlaying::Playing(_) => driver.send(DriverCommand::Pause),
            NowPlaying::Paused(_) => driver.send(DriverCommand::Resume),
            NowPlaying::Loading(_) => Err(PlayerError::StillLoading),
            NowPlaying::Stopped => self.play(current.unwrap_or(0)),
        }
    }

    pub fn stop(&self) -> Result<()> {
        let driver = self.driver()?;
        self.state.lock().manual_control = true;
        driver.send(DriverCommand::Stop)
    }

    pub fn next(&self) -> Result<()> {
        self.driver()?.send(DriverCommand::Next)
    }

    pub fn previous(&self) -> Result<()> {
        self.driver()?.send(DriverCommand::Previous)
    }

    /// Set the volume. Without a device the value is kept and pushed on connect.
    pub fn set_volume(&mut self, volume: Volume) -> Result<()> {
        match &self.driver {
            Some(driver) => driver.send(DriverCommand::SetVolume(volume)),
            None => {
                self.state.lock().volume = volume;
                self.config.initial_volume = Some(volume);
                Ok(())
            }
        }
    }

    pub fn volume_up(&mut self) -> Result<()> {
        let volume = self.state.lock().volume.step_up(self.config.volume_step);
        self.set_volume(volume)
    }

    pub fn volume_down(&mut self) -> Result<()> {
        let volume = self.state.lock().volume.step_down(self.config.volume_step);
        self.set_volume(volume)
    }

    /// Playback events from the driver.
    pub fn events(&self) -> &Receiver<PlayerEvent> {
        &self.events_rx
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let state = self.state.lock();
        PlayerSnapshot {
            devices: self.device_names(),
            device: state.device.as_ref().map(|d| d.name.clone()),
            tracks: state
                .playlist
                .iter()
                .map(|track| match track.duration_display() {
                    Some(duration) => format!("{} ({})", track.display_title(), duration),
                    None => track.display_title(),
                })
                .collect(),
            current: state.playlist.current_index(),
            now_playing: state.now_playing,
            volume: state.volume,
            position: state.position,
            server_url: self.server.base_url(),
        }
    }

    /// Directory the media server currently serves.
    pub fn served_root(&self) -> PathBuf {
        self.server.root()
    }

    /// Stop the drivers and the media server.
    pub fn shutdown(mut self) {
        if let Some(driver) = self.driver.take() {
            driver.shutdown();
        }
        for handle in self.retired.drain(..) {
            if handle.join().is_err() {
                warn!("Retired playback driver panicked");
            }
        }
        match Arc::try_unwrap(self.server) {
            Ok(server) => self.runtime.block_on(server.shutdown()),
            Err(_) => warn!("Media server still in use at shutdown"),
        }
    }

    fn driver(&self) -> Result<&PlaybackDriver> {
        self.driver.as_ref().ok_or(PlayerError::NoDeviceSelected)
    }
}
