// src/main.rs

use std::io::stdout;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use crossterm::{
    cursor::{Hide, Show},
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute,
    terminal::{self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use tokio::sync::mpsc;

use audio_plus::menu::MenuLayout;
use audio_plus::{
    banner, AudioPlayer, AudioPlus, ClockTransport, FileSource, InputEvent, PlayerError,
    TerminalSurface, Transport, WidgetConfig,
};

/// Tallest waveform drawn, in terminal rows.
const MAX_WAVE_ROWS: u16 = 12;

fn surface_dims(cols: u16, rows: u16) -> (usize, usize) {
    // Leave one row for the status line.
    let height = rows.saturating_sub(1).clamp(1, MAX_WAVE_ROWS);
    (cols as usize, height as usize)
}

fn format_time(secs: f64) -> String {
    let secs = if secs.is_finite() { secs.max(0.0) as u64 } else { 0 };
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn status_line(widget: &mut AudioPlus, notice: Option<&str>) -> String {
    let glyph = widget.refresh_glyph();
    let state = widget.transport().snapshot();
    let duration = state.duration.map(format_time).unwrap_or_else(|| "--:--".into());
    let mut line = format!(
        "{} {} / {}  {}×{}",
        glyph.symbol(),
        format_time(state.current_time),
        duration,
        state.playback_rate,
        if state.looping { "  🔁" } else { "" }
    );
    if let Some(notice) = notice {
        line.push_str("  ");
        line.push_str(notice);
    }
    line
}

/// Reads terminal events on a plain thread and forwards them. Ends once the
/// receiving side is gone.
fn spawn_input_thread(tx: mpsc::Sender<Event>) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("audio-plus-input".into())
        .spawn(move || {
            while !tx.is_closed() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => match event::read() {
                        Ok(ev) => {
                            if tx.blocking_send(ev).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            log::error!("❌ Reading terminal input failed: {e}");
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        log::error!("❌ Polling terminal input failed: {e}");
                        break;
                    }
                }
            }
        })
}

async fn run(widget: &mut AudioPlus, surface: Arc<Mutex<TerminalSurface>>) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<Event>(64);
    let input_thread = spawn_input_thread(tx)?;
    // Opening the audio device blocks, so keep it off the async workers.
    tokio::task::block_in_place(|| widget.attach(surface.clone()));

    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    let mut notice: Option<String> = None;

    loop {
        tokio::select! {
            maybe = rx.recv() => {
                let Some(ev) = maybe else { break };
                let input = match ev {
                    Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                        KeyCode::Char('q') => break,
                        KeyCode::Char(' ') => Some(InputEvent::PlayButton),
                        KeyCode::Char('l') => Some(InputEvent::ToggleLoop),
                        KeyCode::Esc => {
                            widget.close_menu();
                            None
                        }
                        _ => None,
                    },
                    Event::Mouse(mouse) => {
                        let (x, y) = (mouse.column as f64, mouse.row as f64);
                        match mouse.kind {
                            MouseEventKind::Down(MouseButton::Left) => Some(InputEvent::PrimaryClick { x, y }),
                            MouseEventKind::Down(MouseButton::Right) => Some(InputEvent::SecondaryClick { x, y }),
                            _ => None,
                        }
                    }
                    Event::Resize(cols, rows) => {
                        let (width, height) = surface_dims(cols, rows);
                        surface.lock().unwrap_or_else(|p| p.into_inner()).resize(width, height);
                        widget.resize(width, height);
                        None
                    }
                    _ => None,
                };

                if let Some(input) = input {
                    notice = match widget.dispatch(input) {
                        Ok(_) => None,
                        Err(PlayerError::PlaybackBlocked(reason)) => Some(format!("🚫 {reason}")),
                        Err(e) => Some(format!("⚠️ {e}")),
                    };
                }
            }
            _ = ticker.tick() => {}
        }

        let line = status_line(widget, notice.as_deref());
        surface.lock().unwrap_or_else(|p| p.into_inner()).set_status(line);
    }

    drop(rx);
    let _ = input_thread.join();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr and would tear the drawing, so keep them quiet by default.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();

    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        anyhow::bail!("usage: player <audio-file> [config.json]");
    };
    let mut config = match args.get(2) {
        Some(config_path) => WidgetConfig::load_from_disk(config_path)?,
        None => WidgetConfig::default(),
    };
    config.source = Some(path.clone());
    // One text row per menu entry.
    config.menu = MenuLayout {
        width: 14,
        row_height: 1,
    };

    banner::print_once(&mut stdout())?;

    let transport: Arc<dyn Transport> = match AudioPlayer::new() {
        Ok(player) => Arc::new(player),
        Err(e) => {
            log::warn!("⚠️ No audio output ({e:#}), running on a silent clock");
            Arc::new(ClockTransport::new())
        }
    };
    let mut widget = AudioPlus::new(config, Arc::new(FileSource::new()), transport)?;

    let (cols, rows) = terminal::size().context("reading terminal size")?;
    let (width, height) = surface_dims(cols, rows);
    let surface = Arc::new(Mutex::new(TerminalSurface::new(width, height)));

    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen, EnableMouseCapture, Hide)?;

    let result = run(&mut widget, surface).await;
    widget.detach();

    execute!(stdout(), Show, DisableMouseCapture, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    println!("🛑 Exiting AudioPlus.");
    result
}
