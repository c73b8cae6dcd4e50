// src/render/terminal.rs

use std::fmt::Write as FmtWrite;
use std::io::{stdout, Write};

use crossterm::{
    cursor::MoveTo,
    execute,
    style::{Color, ResetColor, SetForegroundColor},
    terminal::{BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate},
};

use super::{PixelSurface, Rgb, Surface};

impl From<Rgb> for Color {
    fn from(c: Rgb) -> Self {
        Color::Rgb {
            r: c.r,
            g: c.g,
            b: c.b,
        }
    }
}

/// Surface drawn into the terminal: one character cell per pixel, painted
/// cells become coloured full blocks. A status line sits under the waveform.
pub struct TerminalSurface {
    pixels: PixelSurface,
    status: String,
    // Reusable buffer for terminal output.
    draw_buffer: String,
}

impl TerminalSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: PixelSurface::new(width, height),
            status: String::new(),
            draw_buffer: String::with_capacity(4096),
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.pixels.resize(width, height);
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    fn compose(&mut self) {
        let buf = &mut self.draw_buffer;
        buf.clear();

        for (y, row) in self.pixels.rows().enumerate() {
            let _ = write!(buf, "{}", MoveTo(0, y as u16));
            let mut current: Option<Rgb> = None;
            for cell in row {
                match cell {
                    Some(color) => {
                        if current != Some(*color) {
                            let _ = write!(buf, "{}", SetForegroundColor((*color).into()));
                            current = Some(*color);
                        }
                        buf.push('█');
                    }
                    None => buf.push(' '),
                }
            }
            let _ = write!(buf, "{}{}", ResetColor, Clear(ClearType::UntilNewLine));
        }

        let status_row = self.pixels.height() as u16;
        let _ = write!(
            buf,
            "{}{}{}",
            MoveTo(0, status_row),
            Clear(ClearType::FromCursorDown),
            self.status
        );

        for label in self.pixels.labels() {
            // Labels may sit below the grid, but never off the terminal's range.
            let (Ok(x), Ok(y)) = (u16::try_from(label.x), u16::try_from(label.y)) else {
                continue;
            };
            let _ = write!(
                buf,
                "{}{}{}{}",
                MoveTo(x, y),
                SetForegroundColor(label.color.into()),
                label.text,
                ResetColor
            );
        }
    }
}

impl Surface for TerminalSurface {
    fn width(&self) -> usize {
        self.pixels.width()
    }

    fn height(&self) -> usize {
        self.pixels.height()
    }

    fn clear(&mut self) {
        self.pixels.clear();
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb) {
        self.pixels.fill_rect(x, y, w, h, color);
    }

    fn draw_label(&mut self, x: i32, y: i32, text: &str, color: Rgb) {
        self.pixels.draw_label(x, y, text, color);
    }

    fn present(&mut self) -> anyhow::Result<()> {
        self.compose();
        let mut stdout = stdout();
        execute!(stdout, BeginSynchronizedUpdate)?;
        stdout.write_all(self.draw_buffer.as_bytes())?;
        execute!(stdout, EndSynchronizedUpdate)?;
        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_paints_blocks_and_status() {
        let mut surface = TerminalSurface::new(3, 2);
        surface.fill_rect(1.0, 0.0, 1.0, 2.0, Rgb::new(0x22, 0xc5, 0x5e));
        surface.draw_label(0, 3, "Loop ✓", Rgb::new(255, 255, 255));
        surface.set_status("▶ 00:00 / 00:10");
        surface.compose();

        let out = &surface.draw_buffer;
        assert_eq!(out.matches('█').count(), 2);
        assert!(out.contains("▶ 00:00 / 00:10"));
        assert!(out.contains("Loop ✓"));
    }

    #[test]
    fn test_compose_skips_labels_off_the_terminal() {
        let mut surface = TerminalSurface::new(3, 2);
        surface.draw_label(70_000, 0, "wide", Rgb::new(255, 255, 255));
        surface.draw_label(0, -1, "above", Rgb::new(255, 255, 255));
        surface.draw_label(1, i32::MAX, "deep", Rgb::new(255, 255, 255));
        surface.draw_label(0, 4, "0.5×", Rgb::new(255, 255, 255));
        surface.compose();

        let out = &surface.draw_buffer;
        assert!(!out.contains("wide"));
        assert!(!out.contains("above"));
        assert!(!out.contains("deep"));
        assert!(out.contains("0.5×"));
        // 70_000 would have wrapped to column 4464.
        assert!(!out.contains("\x1b[1;4465H"));
    }
}
