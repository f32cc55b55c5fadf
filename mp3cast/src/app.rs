//! Terminal UI state and key handling
//!
//! Everything here is independent of the terminal so it can be driven from
//! tests; `ui` owns the terminal and rendering.

use std::path::PathBuf;

use crossbeam_channel::{Receiver, TryRecvError};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use mp3cast::{Device, NowPlaying, Player, PlayerEvent, PlayerSnapshot};
use tracing::{debug, info};

/// Which list the cursor keys move in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Devices,
    Playlist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing a file or directory path to add
    AddPath(String),
}

/// Main application state
pub struct App {
    player: Player,
    pub focus: Focus,
    pub input: InputMode,
    pub device_cursor: usize,
    pub track_cursor: usize,
    pub status: String,
    pub show_help: bool,
    pub should_quit: bool,
    pub snapshot: PlayerSnapshot,
    discovery: Option<Receiver<mp3cast::Result<Vec<Device>>>>,
    /// Device named on the command line, selected once discovery finds it
    pending_device: Option<String>,
}

impl App {
    pub fn new(player: Player, pending_device: Option<String>) -> Self {
        let snapshot = player.snapshot();
        let focus = if pending_device.is_some() {
            Focus::Playlist
        } else {
            Focus::Devices
        };

        Self {
            player,
            focus,
            input: InputMode::Normal,
            device_cursor: 0,
            track_cursor: 0,
            status: "Press ? for help".to_string(),
            show_help: false,
            should_quit: false,
            snapshot,
            discovery: None,
            pending_device,
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn is_discovering(&self) -> bool {
        self.discovery.is_some()
    }

    /// Start a background device scan unless one is running.
    pub fn refresh_devices(&mut self) {
        if self.discovery.is_some() {
            return;
        }
        self.status = "Searching for devices...".to_string();
        self.discovery = Some(self.player.start_discovery());
    }

    /// Pick up discovery results and player events, then refresh the snapshot.
    pub fn tick(&mut self) {
        if let Some(receiver) = &self.discovery {
            match receiver.try_recv() {
                Ok(Ok(devices)) => {
                    self.discovery = None;
                    self.on_devices(devices);
                }
                Ok(Err(e)) => {
                    self.discovery = None;
                    self.status = format!("Error: {}", e);
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.discovery = None;
                    self.status = "Discovery failed".to_string();
                }
            }
        }

        while let Ok(event) = self.player.events().try_recv() {
            self.on_event(event);
        }

        self.snapshot = self.player.snapshot();
        self.device_cursor = clamp_cursor(self.device_cursor, self.snapshot.devices.len());
        self.track_cursor = clamp_cursor(self.track_cursor, self.snapshot.tracks.len());
    }

    fn on_devices(&mut self, devices: Vec<Device>) {
        let count = devices.len();
        self.player.set_devices(devices);
        self.status = match count {
            0 => "No devices found, press d to search again".to_string(),
            1 => "Found 1 device".to_string(),
            n => format!("Found {} devices", n),
        };

        if let Some(name) = self.pending_device.take() {
            self.select_device(&name);
        }
    }

    fn on_event(&mut self, event: PlayerEvent) {
        debug!("UI event: {:?}", event);
        self.status = match event {
            PlayerEvent::TrackStarted { index, title } => {
                self.track_cursor = index;
                format!("Playing: {}", title)
            }
            PlayerEvent::Paused => "Paused".to_string(),
            PlayerEvent::Resumed => "Resumed".to_string(),
            PlayerEvent::Stopped => "Stopped".to_string(),
            PlayerEvent::VolumeChanged(volume) => format!("Volume {}", volume),
            PlayerEvent::PlaylistFinished => "Playlist finished".to_string(),
            PlayerEvent::Error(message) => format!("Error: {}", message),
        };
    }

    fn select_device(&mut self, name: &str) {
        self.status = match self.player.select_device(name) {
            Ok(()) => {
                info!("Connected to {}", name);
                self.focus = Focus::Playlist;
                format!("Connected to {}", name)
            }
            Err(e) => format!("Error: {}", e),
        };
    }

    /// Report the outcome of a player call in the status line
    fn report(&mut self, result: mp3cast::Result<()>) {
        if let Err(e) = result {
            self.status = format!("Error: {}", e);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if let InputMode::AddPath(_) = self.input {
            self.handle_input_key(key.code);
            return;
        }

        if self.show_help {
            self.show_help = false;
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Devices => Focus::Playlist,
                    Focus::Playlist => Focus::Devices,
                };
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Enter => self.activate(),
            KeyCode::Char(' ') => {
                let result = self.player.toggle_pause();
                self.report(result);
            }
            KeyCode::Char('s') => {
                let result = self.player.stop();
                self.report(result);
            }
            KeyCode::Char('n') => {
                let result = self.player.next();
                self.report(result);
            }
            KeyCode::Char('p') => {
                let result = self.player.previous();
                self.report(result);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let result = self.player.volume_up();
                self.report(result);
            }
            KeyCode::Char('-') => {
                let result = self.player.volume_down();
                self.report(result);
            }
            KeyCode::Char('a') => self.input = InputMode::AddPath(String::new()),
            KeyCode::Char('c') => {
                self.player.clear_playlist();
                self.track_cursor = 0;
                self.status = "Playlist cleared".to_string();
            }
            KeyCode::Char('d') => self.refresh_devices(),
            _ => {}
        }
        self.snapshot = self.player.snapshot();
    }

    fn handle_input_key(&mut self, code: KeyCode) {
        let InputMode::AddPath(buffer) = &mut self.input else {
            return;
        };

        match code {
            KeyCode::Char(c) => buffer.push(c),
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Esc => self.input = InputMode::Normal,
            KeyCode::Enter => {
                let path = PathBuf::from(buffer.trim());
                self.input = InputMode::Normal;
                self.add_path(path);
            }
            _ => {}
        }
    }

    fn add_path(&mut self, path: PathBuf) {
        if path.as_os_str().is_empty() {
            return;
        }

        let report = self.player.add_files([&path]);
        self.status = match (report.added, report.rejected.len()) {
            (0, _) => format!("Nothing to play in {}", path.display()),
            (added, 0) => format!("Added {} track(s)", added),
            (added, rejected) => format!("Added {} track(s), skipped {}", added, rejected),
        };
        self.snapshot = self.player.snapshot();
    }

    fn move_cursor(&mut self, delta: isize) {
        let (cursor, len) = match self.focus {
            Focus::Devices => (&mut self.device_cursor, self.snapshot.devices.len()),
            Focus::Playlist => (&mut self.track_cursor, self.snapshot.tracks.len()),
        };
        if len == 0 {
            return;
        }
        *cursor = (*cursor as isize + delta).rem_euclid(len as isize) as usize;
    }

    fn activate(&mut self) {
        match self.focus {
            Focus::Devices => {
                if let Some(name) = self.snapshot.devices.get(self.device_cursor).cloned() {
                    self.select_device(&name);
                }
            }
            Focus::Playlist => {
                let result = self.player.play(self.track_cursor);
                self.report(result);
            }
        }
    }

    /// Title of the track the receiver is on, if any
    pub fn now_playing_title(&self) -> Option<&str> {
        let index = self.snapshot.now_playing.index()?;
        self.snapshot.tracks.get(index).map(String::as_str)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.snapshot.now_playing, NowPlaying::Paused(_))
    }

    pub fn into_player(self) -> Player {
        self.player
    }
}

fn clamp_cursor(cursor: usize, len: usize) -> usize {
    cursor.min(len.saturating_sub(1))
}
