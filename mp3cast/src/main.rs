use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use mp3cast::logging::{self, LoggingMode};
use mp3cast::{Player, PlayerConfig, PlayerEvent, Volume};

mod app;
mod ui;

/// Play local audio files on a Chromecast or Google Home speaker
///
/// Discovers Cast receivers on the local network, serves the selected files
/// over HTTP and plays them in order on the chosen device.
#[derive(Parser, Debug)]
#[command(name = "mp3cast")]
#[command(about = "Play local MP3 files on Chromecast and Google Home speakers")]
#[command(version)]
pub struct Args {
    /// Audio files or directories to add to the playlist
    pub files: Vec<PathBuf>,

    /// Device to connect to on startup
    #[arg(short, long)]
    pub device: Option<String>,

    /// Discovery timeout in seconds
    #[arg(short = 't', long, default_value = "3")]
    pub discovery_timeout: u64,

    /// Media server port range start
    #[arg(long, default_value = "8000")]
    pub port_start: u16,

    /// Media server port range end
    #[arg(long, default_value = "8100")]
    pub port_end: u16,

    /// Initial volume (0-100). The device volume is kept when omitted
    #[arg(short, long)]
    pub volume: Option<u8>,

    /// Attempts to load a track before giving up on it
    #[arg(long, default_value = "3")]
    pub load_retries: u32,

    /// Log file for the terminal UI (defaults to the user data directory)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// List discovered devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Play the files without the terminal UI and exit when done
    #[arg(long)]
    pub no_tui: bool,
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.port_start == 0 || self.port_end == 0 {
            return Err(anyhow::anyhow!("Port range must not include port 0"));
        }

        if self.port_start > self.port_end {
            return Err(anyhow::anyhow!(
                "Invalid port range: start ({}) > end ({})",
                self.port_start,
                self.port_end
            ));
        }

        if self.discovery_timeout == 0 {
            return Err(anyhow::anyhow!("Discovery timeout must be positive"));
        }

        if let Some(volume) = self.volume {
            if volume > Volume::MAX.value() {
                return Err(anyhow::anyhow!("Volume must be between 0 and 100, got {}", volume));
            }
        }

        if self.no_tui {
            if self.device.is_none() {
                return Err(anyhow::anyhow!("--no-tui needs a --device to play on"));
            }
            if self.files.is_empty() {
                return Err(anyhow::anyhow!("--no-tui needs at least one file to play"));
            }
        }

        match self.log_level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
                    self.log_level
                ));
            }
        }

        Ok(())
    }

    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            port_range: (self.port_start, self.port_end),
            discovery_timeout: Duration::from_secs(self.discovery_timeout),
            load_retries: self.load_retries,
            initial_volume: self.volume.map(Volume::from),
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;
    let config = args.player_config();
    let level = args.log_level.to_lowercase();

    if args.list_devices {
        logging::init_logging_with_level(LoggingMode::Development, &level)?;
        return list_devices(config);
    }

    if args.no_tui {
        logging::init_logging_with_level(LoggingMode::Development, &level)?;
        return run_headless(args, config);
    }

    // The terminal UI owns stdout, so logs go to a file
    let log_path = args.log_file.clone().unwrap_or_else(logging::default_log_path);
    logging::init_logging_with_level(LoggingMode::File(log_path.clone()), &level)?;
    info!("mp3cast {} starting", env!("CARGO_PKG_VERSION"));

    let mut player = Player::new(config).context("Failed to start the player")?;
    let report = player.add_files(&args.files);

    let mut app = app::App::new(player, args.device);
    if !report.rejected.is_empty() {
        app.set_status(format!("Skipped {} unsupported file(s)", report.rejected.len()));
    }

    let result = ui::run(&mut app);
    app.into_player().shutdown();

    result.with_context(|| format!("Terminal UI failed (log: {})", log_path.display()))
}

/// Discover devices, print them and exit
fn list_devices(config: PlayerConfig) -> Result<()> {
    info!(
        "Discovering devices with timeout of {}s...",
        config.discovery_timeout.as_secs()
    );
    let devices = cast_discovery::try_get_with_timeout(config.discovery_timeout)
        .context("Device discovery failed")?;

    if devices.is_empty() {
        println!("No Cast devices found. Please check:");
        println!("• Network connectivity");
        println!("• Devices are powered on");
        println!("• Devices are on the same network");
        println!("• Firewall settings allow multicast traffic");
        return Ok(());
    }

    println!("Found {} device(s):", devices.len());
    for device in devices {
        println!(
            "  {:<30} {:<20} {}:{}",
            device.name, device.model_name, device.ip_address, device.port
        );
    }
    Ok(())
}

/// Play the files on one device and print events until the playlist ends
fn run_headless(args: Args, config: PlayerConfig) -> Result<()> {
    let stop_requested = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop_requested);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;

    let mut player = Player::new(config).context("Failed to start the player")?;
    let report = player.add_files(&args.files);
    for path in &report.rejected {
        warn!("Skipping {}", path.display());
    }
    if report.added == 0 {
        player.shutdown();
        return Err(anyhow::anyhow!("None of the given files can be played"));
    }

    let device = args.device.as_deref().unwrap_or_default();
    let names = player.discover().context("Device discovery failed")?;
    if let Err(e) = player.select_device(device) {
        player.shutdown();
        return Err(e).with_context(|| format!("Available devices: {}", names.join(", ")));
    }

    player.play(0).context("Failed to start playback")?;
    println!("Playing {} track(s) on {}. Press Ctrl+C to stop.", report.added, device);

    let result = loop {
        if stop_requested.load(Ordering::SeqCst) {
            info!("Interrupted, stopping playback");
            let _ = player.stop();
            break Ok(());
        }

        match player.events().recv_timeout(Duration::from_millis(200)) {
            Ok(PlayerEvent::TrackStarted { index, title }) => {
                println!("▶ {}. {}", index + 1, title);
            }
            Ok(PlayerEvent::PlaylistFinished) => {
                println!("Playlist finished");
                break Ok(());
            }
            Ok(PlayerEvent::Error(message)) => {
                eprintln!("Error: {}", message);
                if player.snapshot().now_playing == mp3cast::NowPlaying::Stopped {
                    break Err(anyhow::anyhow!(message));
                }
            }
            Ok(event) => info!("{:?}", event),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                break Err(anyhow::anyhow!("Playback driver stopped unexpectedly"));
            }
        }
    };

    player.shutdown();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("mp3cast").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert!(args.validate().is_ok());

        let config = args.player_config();
        assert_eq!(config.port_range, (8000, 8100));
        assert_eq!(config.discovery_timeout, Duration::from_secs(3));
        assert_eq!(config.initial_volume, None);
    }

    #[test]
    fn test_files_and_volume() {
        let args = parse(&["-v", "40", "a.mp3", "music/"]);
        assert_eq!(args.files, vec![PathBuf::from("a.mp3"), PathBuf::from("music/")]);
        assert_eq!(args.player_config().initial_volume, Some(Volume::new(40)));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(parse(&["--port-start", "9000", "--port-end", "8000"]).validate().is_err());
        assert!(parse(&["--discovery-timeout", "0"]).validate().is_err());
        assert!(parse(&["--volume", "101"]).validate().is_err());
        assert!(parse(&["--log-level", "loud"]).validate().is_err());
    }

    #[test]
    fn test_headless_needs_device_and_files() {
        assert!(parse(&["--no-tui", "a.mp3"]).validate().is_err());
        assert!(parse(&["--no-tui", "--device", "Kitchen"]).validate().is_err());
        assert!(parse(&["--no-tui", "--device", "Kitchen", "a.mp3"]).validate().is_ok());
    }
}
