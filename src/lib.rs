// src/lib.rs

pub mod audio;
pub mod banner;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod error;
pub mod menu;
mod player;
pub mod render;
pub mod source;
pub mod transport;
pub mod waveform;
pub mod widget;

pub use config::WidgetConfig;
pub use controller::{PlayGlyph, TransportController};
pub use error::PlayerError;
pub use menu::{MenuEntry, MenuState, SpeedMenu};
pub use player::AudioPlayer;
pub use render::{PixelSurface, Surface, TerminalSurface};
pub use source::{AudioSource, DecodedAudio, FileSource};
pub use transport::{ClockTransport, Transport, TransportState};
pub use waveform::{extract_peaks, WaveformStore};
pub use widget::{AudioPlus, EventOutcome, InputEvent};
