//! Terminal rendering and the event loop

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};

use mp3cast::track::format_seconds;
use mp3cast::NowPlaying;

use crate::app::{App, Focus, InputMode};

/// How long to wait for a key before refreshing from the player
const TICK: Duration = Duration::from_millis(100);

const HELP: &[(&str, &str)] = &[
    ("d", "Search for devices"),
    ("Enter", "Connect to device / play track"),
    ("Tab", "Switch between devices and playlist"),
    ("↑ ↓", "Move the cursor"),
    ("Space", "Play / pause"),
    ("s", "Stop"),
    ("n / p", "Next / previous track"),
    ("+ / -", "Volume up / down"),
    ("a", "Add a file or directory"),
    ("c", "Clear the playlist"),
    ("q", "Quit"),
];

/// Run the UI until the user quits. The terminal is restored on every path.
pub fn run(app: &mut App) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = run_app(app, &mut terminal);
    restore_terminal()?;
    result
}

fn run_app(app: &mut App, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    app.refresh_devices();

    loop {
        app.tick();
        terminal.draw(|f| render(f, app))?;

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                // Windows reports releases too
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(frame.size());

    render_devices(frame, app, chunks[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Now playing
            Constraint::Length(3), // Progress
            Constraint::Length(3), // Volume
            Constraint::Min(3),    // Playlist
            Constraint::Length(3), // Status / input
        ])
        .split(chunks[1]);

    render_now_playing(frame, app, right[0]);
    render_progress(frame, app, right[1]);
    render_volume(frame, app, right[2]);
    render_playlist(frame, app, right[3]);
    render_status(frame, app, right[4]);

    if app.show_help {
        render_help(frame);
    }
}

fn focus_style(app: &App, focus: Focus) -> Style {
    if app.focus == focus {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn render_devices(frame: &mut Frame, app: &App, area: Rect) {
    let connected = app.snapshot.device.as_deref();
    let items: Vec<ListItem> = app
        .snapshot
        .devices
        .iter()
        .map(|name| {
            if Some(name.as_str()) == connected {
                ListItem::new(format!("🔊 {}", name)).style(Style::default().fg(Color::Green))
            } else {
                ListItem::new(format!("   {}", name))
            }
        })
        .collect();

    let title = if app.is_discovering() {
        "Devices (searching...)"
    } else {
        "Devices"
    };

    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(focus_style(app, Focus::Devices)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = ListState::default();
    if !app.snapshot.devices.is_empty() {
        state.select(Some(app.device_cursor));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_now_playing(frame: &mut Frame, app: &App, area: Rect) {
    let (text, color) = match (app.snapshot.now_playing, app.now_playing_title()) {
        (NowPlaying::Loading(_), Some(title)) => (format!("⏳ Loading {}", title), Color::Gray),
        (NowPlaying::Playing(_), Some(title)) => (format!("▶ {}", title), Color::Cyan),
        (NowPlaying::Paused(_), Some(title)) => (format!("⏸ {}", title), Color::Yellow),
        _ => ("⏹ Stopped".to_string(), Color::DarkGray),
    };

    let device = app.snapshot.device.as_deref().unwrap_or("No device");
    let header = Paragraph::new(text)
        .block(Block::default().title(device).borders(Borders::ALL))
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD));
    frame.render_widget(header, area);
}

fn render_progress(frame: &mut Frame, app: &App, area: Rect) {
    let (ratio, label) = match app.snapshot.position {
        Some(position) => match position.duration.filter(|d| *d > 0.0) {
            Some(duration) => (
                f64::from((position.current / duration).clamp(0.0, 1.0)),
                format!("{} / {}", format_seconds(position.current), format_seconds(duration)),
            ),
            None => (0.0, format_seconds(position.current)),
        },
        None => (0.0, "--:--".to_string()),
    };

    let color = if app.is_paused() { Color::Yellow } else { Color::Cyan };
    let gauge = Gauge::default()
        .block(Block::default().title("Progress").borders(Borders::ALL))
        .gauge_style(Style::default().fg(color))
        .ratio(ratio)
        .label(label);
    frame.render_widget(gauge, area);
}

fn render_volume(frame: &mut Frame, app: &App, area: Rect) {
    let volume = app.snapshot.volume;
    let gauge = Gauge::default()
        .block(Block::default().title("Volume").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(u16::from(volume.value()))
        .label(volume.to_string());
    frame.render_widget(gauge, area);
}

fn render_playlist(frame: &mut Frame, app: &App, area: Rect) {
    let playing = app.snapshot.now_playing.index();
    let items: Vec<ListItem> = app
        .snapshot
        .tracks
        .iter()
        .enumerate()
        .map(|(i, title)| {
            let line = format!("{:>3}. {}", i + 1, title);
            if Some(i) == playing {
                ListItem::new(line).style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            } else {
                ListItem::new(line)
            }
        })
        .collect();

    let title = format!("Playlist ({} tracks)", app.snapshot.tracks.len());
    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(focus_style(app, Focus::Playlist)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = ListState::default();
    if !app.snapshot.tracks.is_empty() {
        state.select(Some(app.track_cursor));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let paragraph = match &app.input {
        InputMode::AddPath(buffer) => Paragraph::new(format!("{}█", buffer))
            .block(Block::default().title("Add file or directory (Enter / Esc)").borders(Borders::ALL))
            .style(Style::default().fg(Color::Yellow)),
        InputMode::Normal => {
            let color = if app.status.starts_with("Error") {
                Color::Red
            } else {
                Color::DarkGray
            };
            Paragraph::new(app.status.as_str())
                .block(
                    Block::default()
                        .title(format!("Serving on {}", app.snapshot.server_url))
                        .borders(Borders::ALL),
                )
                .style(Style::default().fg(color))
        }
    };
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame) {
    let lines: Vec<String> = HELP
        .iter()
        .map(|(key, action)| format!("{:>7}  {}", key, action))
        .collect();

    let area = centered(frame.size(), 50, lines.len() as u16 + 2);
    let help = Paragraph::new(lines.join("\n"))
        .block(Block::default().title("Keys (any key to close)").borders(Borders::ALL));

    frame.render_widget(Clear, area);
    frame.render_widget(help, area);
}

/// A `width` x `height` rectangle centered in `area`, shrunk to fit.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
