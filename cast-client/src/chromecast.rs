//! Chromecast backend built on `rust_cast`.

use std::sync::Once;

use rust_cast::channels::media::{Media, Metadata, MusicTrackMediaMetadata, StreamType};
use rust_cast::channels::receiver::CastDeviceApp;
use rust_cast::CastDevice;
use tracing::{debug, info};

use crate::controller::MediaController;
use crate::error::{CastError, Result};
use crate::status::{MediaMetadata, MediaStatus};
use crate::volume::Volume;

/// Virtual connection endpoint of the receiver platform
const RECEIVER_DESTINATION: &str = "receiver-0";

/// App id of the Default Media Receiver
pub const DEFAULT_MEDIA_RECEIVER_ID: &str = "CC1AD845";

/// App id of the idle screen shown when nothing is casting
const BACKDROP_APP_ID: &str = "E8C28D3C";

/// Display name of an app other than the media receiver holding the device.
///
/// `apps` yields `(app_id, display_name)` pairs from the receiver status.
/// Returns `None` while the Default Media Receiver is still running or the
/// device only shows its idle screen.
fn foreign_app<'a>(apps: impl IntoIterator<Item = (&'a str, &'a str)>) -> Option<String> {
    let mut foreign = None;
    for (app_id, name) in apps {
        if app_id == DEFAULT_MEDIA_RECEIVER_ID {
            return None;
        }
        if app_id != BACKDROP_APP_ID && foreign.is_none() {
            foreign = Some(name.to_string());
        }
    }
    foreign
}

/// Installs the rustls crypto provider used by `rust_cast` exactly once.
fn ensure_crypto_provider() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = rustls::crypto::CryptoProvider::install_default(
            rustls::crypto::aws_lc_rs::default_provider(),
        );
    });
}

/// Ids of the Default Media Receiver session on the device.
#[derive(Debug, Default)]
struct Session {
    transport_id: Option<String>,
    session_id: Option<String>,
    media_session_id: Option<i32>,
}

impl Session {
    fn clear(&mut self) {
        *self = Session::default();
    }
}

/// [`MediaController`] for a Chromecast or Google Home receiver.
///
/// A fresh TLS connection is opened per operation, so the controller never
/// has to run a heartbeat loop. Receiver and media session ids are cached
/// between operations; when a cached id has gone stale (the app was closed
/// from another sender, the device rebooted) it is re-resolved from the
/// receiver status once before the operation fails.
#[derive(Debug)]
pub struct ChromecastController {
    host: String,
    port: u16,
    session: Session,
}

impl ChromecastController {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ensure_crypto_provider();
        Self {
            host: host.into(),
            port,
            session: Session::default(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Open a connection and the platform virtual channel.
    ///
    /// Cast devices present self-signed certificates, so host verification is
    /// disabled.
    fn connect(&self) -> Result<CastDevice<'static>> {
        debug!("Connecting to Chromecast at {}:{}", self.host, self.port);

        let device = CastDevice::connect_without_host_verification(self.host.clone(), self.port)
            .map_err(|e| CastError::Connection(format!("{}:{}: {}", self.host, self.port, e)))?;
        device
            .connection
            .connect(RECEIVER_DESTINATION)
            .map_err(|e| CastError::Connection(e.to_string()))?;
        device
            .heartbeat
            .ping()
            .map_err(|e| CastError::Connection(e.to_string()))?;

        Ok(device)
    }

    /// Look up a running Default Media Receiver and cache its ids.
    fn find_running_app(&mut self, device: &CastDevice<'_>) -> Result<Option<String>> {
        let status = device
            .receiver
            .get_status()
            .map_err(|e| CastError::Command(format!("receiver status: {}", e)))?;

        let app = status
            .applications
            .iter()
            .find(|app| app.app_id == DEFAULT_MEDIA_RECEIVER_ID);

        Ok(app.map(|app| {
            debug!(
                "Found running media receiver: session_id={}, transport_id={}",
                app.session_id, app.transport_id
            );
            self.session.session_id = Some(app.session_id.clone());
            self.session.transport_id = Some(app.transport_id.clone());
            app.transport_id.clone()
        }))
    }

    /// Reuse or launch the Default Media Receiver and connect to its transport.
    ///
    /// Returns `(transport_id, session_id)`.
    fn ensure_app(&mut self, device: &CastDevice<'_>) -> Result<(String, String)> {
        if self.session.transport_id.is_none() || self.session.session_id.is_none() {
            if self.find_running_app(device)?.is_none() {
                debug!("Launching Default Media Receiver app");
                let app = device
                    .receiver
                    .launch_app(&CastDeviceApp::DefaultMediaReceiver)
                    .map_err(|e| CastError::Launch(e.to_string()))?;
                debug!(
                    "Launched app with session_id: {}, transport_id: {}",
                    app.session_id, app.transport_id
                );
                self.session.session_id = Some(app.session_id);
                self.session.transport_id = Some(app.transport_id);
                self.session.media_session_id = None;
            }
        }

        let (Some(transport_id), Some(session_id)) = (
            self.session.transport_id.clone(),
            self.session.session_id.clone(),
        ) else {
            return Err(CastError::NoSession);
        };

        device
            .connection
            .connect(transport_id.clone())
            .map_err(|e| CastError::Connection(e.to_string()))?;

        Ok((transport_id, session_id))
    }

    /// Connect to the media app and return `(transport_id, media_session_id)`.
    fn media_session(&mut self, device: &CastDevice<'_>) -> Result<(String, i32)> {
        let transport_id = match self.session.transport_id.clone() {
            Some(transport_id) => transport_id,
            None => self.find_running_app(device)?.ok_or(CastError::NoSession)?,
        };

        device
            .connection
            .connect(transport_id.clone())
            .map_err(|e| CastError::Connection(e.to_string()))?;

        if let Some(media_session_id) = self.session.media_session_id {
            return Ok((transport_id, media_session_id));
        }

        let status = device
            .media
            .get_status(transport_id.clone(), None)
            .map_err(|e| CastError::Command(format!("media status: {}", e)))?;
        let media_session_id = status
            .entries
            .first()
            .map(|entry| entry.media_session_id)
            .ok_or(CastError::NoSession)?;

        self.session.media_session_id = Some(media_session_id);
        Ok((transport_id, media_session_id))
    }

    /// Run a media command, re-resolving the session once if it fails.
    fn media_command<F>(&mut self, action: &str, command: F) -> Result<()>
    where
        F: Fn(&CastDevice<'static>, String, i32) -> std::result::Result<(), rust_cast::errors::Error>,
    {
        debug!("ChromecastController: {}()", action);
        let device = self.connect()?;

        let first_attempt = self
            .media_session(&device)
            .and_then(|(transport_id, media_session_id)| {
                command(&device, transport_id, media_session_id)
                    .map_err(|e| CastError::Command(format!("{}: {}", action, e)))
            });

        match first_attempt {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("{} failed with cached session ({}), re-resolving", action, e);
                self.session.clear();
                let (transport_id, media_session_id) = self.media_session(&device)?;
                command(&device, transport_id, media_session_id)
                    .map_err(|e| CastError::Command(format!("{}: {}", action, e)))
            }
        }
    }

    fn build_media(url: &str, content_type: &str, metadata: &MediaMetadata) -> Media {
        let music_metadata = MusicTrackMediaMetadata {
            title: Some(metadata.title.clone()),
            artist: metadata.artist.clone(),
            album_name: metadata.album.clone(),
            ..Default::default()
        };

        Media {
            content_id: url.to_string(),
            content_type: content_type.to_string(),
            stream_type: StreamType::Buffered,
            metadata: Some(Metadata::MusicTrack(music_metadata)),
            duration: None,
        }
    }
}

impl MediaController for ChromecastController {
    fn load(&mut self, url: &str, content_type: &str, metadata: &MediaMetadata) -> Result<()> {
        debug!("ChromecastController: load({})", url);
        let device = self.connect()?;
        let media = Self::build_media(url, content_type, metadata);

        let (transport_id, session_id) = self.ensure_app(&device)?;
        let status = match device
            .media
            .load(transport_id.clone(), session_id.clone(), &media)
        {
            Ok(status) => status,
            Err(e) => {
                debug!("Load failed with cached session ({}), relaunching", e);
                self.session.clear();
                let (transport_id, session_id) = self.ensure_app(&device)?;
                device
                    .media
                    .load(transport_id.clone(), session_id.clone(), &media)
                    .map_err(|e| CastError::Load(e.to_string()))?
            }
        };

        self.session.media_session_id = status.entries.first().map(|entry| entry.media_session_id);
        info!("Loaded '{}' on {}:{}", metadata.title, self.host, self.port);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.media_command("play", |device, transport_id, media_session_id| {
            device.media.play(transport_id, media_session_id).map(|_| ())
        })
    }

    fn pause(&mut self) -> Result<()> {
        self.media_command("pause", |device, transport_id, media_session_id| {
            device.media.pause(transport_id, media_session_id).map(|_| ())
        })
    }

    fn stop(&mut self) -> Result<()> {
        let result = self.media_command("stop", |device, transport_id, media_session_id| {
            device.media.stop(transport_id, media_session_id).map(|_| ())
        });
        self.session.media_session_id = None;
        result
    }

    fn set_volume(&mut self, volume: Volume) -> Result<()> {
        debug!("ChromecastController: set_volume({})", volume);
        let device = self.connect()?;
        device
            .receiver
            .set_volume(volume.level())
            .map_err(|e| CastError::Command(format!("set_volume: {}", e)))?;
        Ok(())
    }

    fn volume(&mut self) -> Result<Volume> {
        let device = self.connect()?;
        let status = device
            .receiver
            .get_status()
            .map_err(|e| CastError::Command(format!("receiver status: {}", e)))?;

        if status.volume.muted.unwrap_or(false) {
            return Ok(Volume::MIN);
        }
        Ok(Volume::from_level(status.volume.level.unwrap_or(0.0)))
    }

    fn status(&mut self) -> Result<Option<MediaStatus>> {
        let device = self.connect()?;
        let receiver = device
            .receiver
            .get_status()
            .map_err(|e| CastError::Command(format!("receiver status: {}", e)))?;

        let transport_id = match receiver
            .applications
            .iter()
            .find(|app| app.app_id == DEFAULT_MEDIA_RECEIVER_ID)
        {
            Some(app) => {
                self.session.session_id = Some(app.session_id.clone());
                self.session.transport_id = Some(app.transport_id.clone());
                app.transport_id.clone()
            }
            None => {
                self.session.clear();
                let apps = receiver
                    .applications
                    .iter()
                    .map(|app| (app.app_id.as_str(), app.display_name.as_str()));
                return match foreign_app(apps) {
                    Some(name) => {
                        info!("{} replaced the media receiver on {}", name, self.host);
                        Err(CastError::AppReplaced(name))
                    }
                    None => Ok(None),
                };
            }
        };

        device
            .connection
            .connect(transport_id.clone())
            .map_err(|e| CastError::Connection(e.to_string()))?;

        let status = match device.media.get_status(transport_id.clone(), None) {
            Ok(status) => status,
            Err(e) => {
                // The app is gone; the next call resolves it again
                self.session.clear();
                return Err(CastError::Command(format!("media status: {}", e)));
            }
        };

        let entry = status.entries.first();
        self.session.media_session_id = entry.map(|entry| entry.media_session_id);
        Ok(entry.map(MediaStatus::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_media_uses_buffered_music_track() {
        let metadata = MediaMetadata {
            title: "Song".to_string(),
            artist: Some("Artist".to_string()),
            album: None,
        };
        let media = ChromecastController::build_media(
            "http://192.168.1.2:8000/song.mp3",
            "audio/mpeg",
            &metadata,
        );

        assert_eq!(media.content_id, "http://192.168.1.2:8000/song.mp3");
        assert_eq!(media.content_type, "audio/mpeg");
        assert!(matches!(media.stream_type, StreamType::Buffered));
        match media.metadata {
            Some(Metadata::MusicTrack(track)) => {
                assert_eq!(track.title.as_deref(), Some("Song"));
                assert_eq!(track.artist.as_deref(), Some("Artist"));
            }
            other => panic!("unexpected metadata: {:?}", other),
        }
    }

    #[test]
    fn test_connect_failure_is_connection_error() {
        // Nothing listens on the discard port of localhost
        let mut controller = ChromecastController::new("127.0.0.1", 9);
        assert!(matches!(controller.status(), Err(CastError::Connection(_))));
        assert!(matches!(
            controller.set_volume(Volume::new(10)),
            Err(CastError::Connection(_))
        ));
    }

    #[test]
    fn test_foreign_app_detection() {
        assert_eq!(foreign_app(Vec::<(&str, &str)>::new()), None);
        assert_eq!(foreign_app([(BACKDROP_APP_ID, "Backdrop")]), None);
        assert_eq!(
            foreign_app([(DEFAULT_MEDIA_RECEIVER_ID, "Default Media Receiver")]),
            None
        );
        assert_eq!(
            foreign_app([(BACKDROP_APP_ID, "Backdrop"), ("CC32E753", "Spotify")]),
            Some("Spotify".to_string())
        );
        // Our receiver running next to another app still counts as ours
        assert_eq!(
            foreign_app([("CC32E753", "Spotify"), (DEFAULT_MEDIA_RECEIVER_ID, "Default Media Receiver")]),
            None
        );
    }
}
