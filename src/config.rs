// src/config.rs

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::menu::{MenuLayout, DEFAULT_SPEEDS};
use crate::render::Palette;

/// Everything a host sets on the widget. Missing keys fall back to defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WidgetConfig {
    /// Locator of the audio to show and play.
    pub source: Option<String>,
    pub palette: Palette,
    pub frame_interval_ms: u64,
    pub speed_options: Vec<f64>,
    pub menu: MenuLayout,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            source: None,
            palette: Palette::default(),
            frame_interval_ms: 16,
            speed_options: DEFAULT_SPEEDS.to_vec(),
            menu: MenuLayout::default(),
        }
    }
}

impl WidgetConfig {
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn save_to_disk(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("creating config {}", path.display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_from_disk(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let reader = BufReader::new(file);
        let config = serde_json::from_reader(reader)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Rgb;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.json");

        let mut config = WidgetConfig::with_source("clips/intro.mp3");
        config.palette.played = Rgb::new(0xff, 0x00, 0x80);
        config.frame_interval_ms = 33;
        config.save_to_disk(&path).unwrap();

        assert_eq!(WidgetConfig::load_from_disk(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.json");
        std::fs::write(&path, r##"{ "source": "a.wav", "palette": { "played": "#fff" } }"##)
            .unwrap();

        let config = WidgetConfig::load_from_disk(&path).unwrap();
        assert_eq!(config.source.as_deref(), Some("a.wav"));
        assert_eq!(config.palette.played, Rgb::new(255, 255, 255));
        assert_eq!(config.palette.unplayed, Palette::default().unplayed);
        assert_eq!(config.speed_options, DEFAULT_SPEEDS.to_vec());
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_bad_colour_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.json");
        std::fs::write(&path, r#"{ "palette": { "played": "green" } }"#).unwrap();
        assert!(WidgetConfig::load_from_disk(&path).is_err());
    }
}
