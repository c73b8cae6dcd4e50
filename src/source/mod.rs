// src/source/mod.rs

pub mod decode;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{PlayerError, Result};

/// Fully decoded audio: one sample vector per channel.
#[derive(Debug, Clone, Default)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
    pub duration: f64,
}

impl DecodedAudio {
    /// Channel the waveform is drawn from (the first one).
    pub fn reference_channel(&self) -> &[f32] {
        self.channels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_reference_channel(self) -> Vec<f32> {
        self.channels.into_iter().next().unwrap_or_default()
    }
}

/// Where waveform data comes from: raw bytes for a locator, then PCM.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn fetch_bytes(&self, locator: &str) -> Result<Vec<u8>>;

    async fn decode(&self, bytes: Vec<u8>) -> Result<DecodedAudio>;
}

/// Reads locators as local file paths (a `file://` prefix is accepted) and
/// decodes them with symphonia on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    root: Option<PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves relative locators against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn resolve(&self, locator: &str) -> PathBuf {
        let path = PathBuf::from(locator.strip_prefix("file://").unwrap_or(locator));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        }
    }
}

#[async_trait]
impl AudioSource for FileSource {
    async fn fetch_bytes(&self, locator: &str) -> Result<Vec<u8>> {
        let path = self.resolve(locator);
        tokio::fs::read(&path)
            .await
            .map_err(|source| PlayerError::Network {
                locator: locator.to_string(),
                source,
            })
    }

    async fn decode(&self, bytes: Vec<u8>) -> Result<DecodedAudio> {
        tokio::task::spawn_blocking(move || decode::decode_to_planar(bytes))
            .await
            .map_err(|e| PlayerError::Decode(format!("decode task failed: {e}")))?
    }
}
