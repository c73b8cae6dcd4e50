// src/controller.rs

use std::sync::Arc;

use crate::error::Result;
use crate::transport::{known_duration, Transport};

/// What the play button shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayGlyph {
    /// Paused: the button offers to play.
    Play,
    /// Playing: the button offers to pause.
    Pause,
}

impl PlayGlyph {
    pub fn symbol(&self) -> &'static str {
        match self {
            PlayGlyph::Play => "▶",
            PlayGlyph::Pause => "⏸",
        }
    }
}

/// Turns button presses and surface clicks into transport commands.
pub struct TransportController {
    transport: Arc<dyn Transport>,
    glyph: PlayGlyph,
}

impl TransportController {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let glyph = if transport.paused() {
            PlayGlyph::Play
        } else {
            PlayGlyph::Pause
        };
        Self { transport, glyph }
    }

    pub fn glyph(&self) -> PlayGlyph {
        self.glyph
    }

    /// Re-reads the glyph from the transport, e.g. after playback ran out.
    pub fn refresh(&mut self) -> PlayGlyph {
        self.glyph = if self.transport.paused() {
            PlayGlyph::Play
        } else {
            PlayGlyph::Pause
        };
        self.glyph
    }

    /// Plays when paused, pauses when playing. A rejected play leaves the
    /// glyph on `Play` and hands the error back; nothing is retried.
    pub fn toggle_playback(&mut self) -> Result<PlayGlyph> {
        if self.transport.paused() {
            if let Err(e) = self.transport.play() {
                self.glyph = PlayGlyph::Play;
                log::warn!("🚫 Play rejected: {e}");
                return Err(e);
            }
            self.glyph = PlayGlyph::Pause;
            log::debug!("▶️ Playing");
        } else {
            self.transport.pause();
            self.glyph = PlayGlyph::Play;
            log::debug!("⏸️ Paused");
        }
        Ok(self.glyph)
    }

    /// Jumps to the time under `pointer_x` on a surface `surface_width` pixels
    /// wide. Returns the new time, or `None` when the click was ignored
    /// (unknown duration, empty surface or a pointer outside it).
    pub fn seek(&self, pointer_x: f64, surface_width: usize) -> Option<f64> {
        let duration = known_duration(self.transport.duration())?;
        let width = surface_width as f64;
        if surface_width == 0 || !(0.0..=width).contains(&pointer_x) {
            return None;
        }
        let target = (pointer_x / width * duration).clamp(0.0, duration);
        self.transport.set_current_time(target);
        log::debug!("⏩ Seek to {target:.2}s");
        Some(target)
    }
}
