// src/render/mod.rs

pub mod color;
pub mod frame_loop;
pub mod pixels;
pub mod terminal;

use std::sync::{Arc, Mutex};

pub use color::{Palette, Rgb};
pub use frame_loop::RenderLoop;
pub use pixels::PixelSurface;
pub use terminal::TerminalSurface;

use crate::menu::{MenuEntry, SpeedMenu};
use crate::transport::Transport;
use crate::waveform::WaveformStore;

/// A 2D target measured in device pixels.
pub trait Surface: Send {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn clear(&mut self);
    /// Fills a rectangle; implementations clip to their bounds.
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb);
    fn draw_label(&mut self, _x: i32, _y: i32, _text: &str, _color: Rgb) {}
    /// Makes the finished frame visible.
    fn present(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Surface dimensions in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: usize,
    pub height: usize,
}

impl SurfaceSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Device size of a `width × height` logical box at the given pixel ratio.
    pub fn from_logical(width: f64, height: f64, scale: f64) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        let px = |v: f64| if v.is_finite() && v > 0.0 { (v * scale).floor() as usize } else { 0 };
        Self {
            width: px(width),
            height: px(height),
        }
    }
}

/// Whether bar `index` of `len` lies before the playhead.
pub fn bar_is_played(index: usize, len: usize, progress: f64) -> bool {
    len > 0 && (index as f64) / (len as f64) < progress
}

/// Draws one bar per peak, mirrored around the vertical middle.
pub fn draw_bars(surface: &mut dyn Surface, peaks: &[f32], progress: f64, palette: &Palette) {
    let mid = surface.height() as f64 / 2.0;
    for (i, &peak) in peaks.iter().enumerate() {
        let h = peak as f64 * mid;
        let color = if bar_is_played(i, peaks.len(), progress) {
            palette.played
        } else {
            palette.unplayed
        };
        surface.fill_rect(i as f64, mid - h, 1.0, h * 2.0, color);
    }
}

/// Read-only view of the widget state that paints frames.
#[derive(Clone)]
pub struct Renderer {
    store: Arc<WaveformStore>,
    transport: Arc<dyn Transport>,
    menu: Arc<Mutex<SpeedMenu>>,
    palette: Palette,
}

impl Renderer {
    pub fn new(
        store: Arc<WaveformStore>,
        transport: Arc<dyn Transport>,
        menu: Arc<Mutex<SpeedMenu>>,
        palette: Palette,
    ) -> Self {
        Self {
            store,
            transport,
            menu,
            palette,
        }
    }

    /// One frame: the waveform pass, then the menu overlay.
    pub fn draw(&self, surface: &mut dyn Surface) {
        self.draw_waveform(surface);
        self.draw_menu(surface);
    }

    /// Clears the surface and paints the bars. Stays blank while no peaks exist.
    pub fn draw_waveform(&self, surface: &mut dyn Surface) {
        surface.clear();
        let Some(peaks) = self.store.peaks() else {
            return;
        };
        let state = self.transport.snapshot();
        draw_bars(surface, &peaks, state.progress(), &self.palette);
    }

    pub fn draw_menu(&self, surface: &mut dyn Surface) {
        let rows = match self.menu.lock() {
            Ok(menu) => menu.rows(),
            Err(poisoned) => poisoned.into_inner().rows(),
        };
        let Some(first) = rows.first() else {
            return;
        };
        let total_height = rows.iter().fold(0i32, |acc, r| acc.saturating_add(r.height));
        surface.fill_rect(
            first.x as f64,
            first.y as f64,
            first.width as f64,
            total_height as f64,
            self.palette.menu_background,
        );

        for row in &rows {
            match row.entry {
                MenuEntry::Separator => surface.fill_rect(
                    row.x as f64,
                    row.y.saturating_add(row.height / 2) as f64,
                    row.width as f64,
                    1.0,
                    self.palette.unplayed,
                ),
                MenuEntry::Header(_) => {
                    surface.draw_label(row.x, row.y, &row.entry.label(), self.palette.menu_text)
                }
                MenuEntry::Speed(_) | MenuEntry::Loop => {
                    let (text, color) = if row.active {
                        (format!("{} ✓", row.entry.label()), self.palette.menu_active)
                    } else {
                        (row.entry.label(), self.palette.menu_text)
                    };
                    surface.draw_label(row.x, row.y, &text, color);
                }
            }
        }
    }
}
