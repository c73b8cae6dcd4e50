// src/render/pixels.rs

use super::{Rgb, Surface};

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub x: i32,
    pub y: i32,
    pub text: String,
    pub color: Rgb,
}

/// In-memory surface: a grid of optional colours plus the labels drawn on top.
#[derive(Debug, Clone)]
pub struct PixelSurface {
    width: usize,
    height: usize,
    pixels: Vec<Option<Rgb>>,
    labels: Vec<Label>,
}

impl PixelSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![None; width * height],
            labels: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Self::new(width, height);
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x]
        } else {
            None
        }
    }

    /// Number of painted pixels in column `x`.
    pub fn column_height(&self, x: usize) -> usize {
        (0..self.height).filter(|&y| self.pixel(x, y).is_some()).count()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn is_blank(&self) -> bool {
        self.labels.is_empty() && self.pixels.iter().all(Option::is_none)
    }

    /// Rows of the grid, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Option<Rgb>]> {
        self.pixels.chunks(self.width.max(1)).take(self.height)
    }
}

fn span(start: f64, len: f64, limit: usize) -> Option<(usize, usize)> {
    if !start.is_finite() || !len.is_finite() {
        return None;
    }
    let a = start.round().clamp(0.0, limit as f64) as usize;
    let b = (start + len).round().clamp(0.0, limit as f64) as usize;
    (a < b).then_some((a, b))
}

impl Surface for PixelSurface {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn clear(&mut self) {
        self.pixels.fill(None);
        self.labels.clear();
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb) {
        let (Some((x0, x1)), Some((y0, y1))) = (span(x, w, self.width), span(y, h, self.height))
        else {
            return;
        };
        for row in y0..y1 {
            self.pixels[row * self.width + x0..row * self.width + x1].fill(Some(color));
        }
    }

    fn draw_label(&mut self, x: i32, y: i32, text: &str, color: Rgb) {
        self.labels.push(Label {
            x,
            y,
            text: text.to_string(),
            color,
        });
    }
}
