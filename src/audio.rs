// src/audio.rs

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::Consumer;
use std::sync::Arc;

/// Helper struct to hold output device info
pub struct OutputConfig {
    pub device: Device,
    pub config: StreamConfig,
    pub sample_format: SampleFormat,
    pub output_channels: usize,
    pub output_sample_rate: u32,
}

/// Finds the default audio output device and its config.
pub fn setup_output_device() -> Result<OutputConfig, anyhow::Error> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no output device available")?;
    let supported_config = device.default_output_config()?;
    let sample_format = supported_config.sample_format();
    let config = supported_config.config();
    let output_channels = config.channels as usize;
    let output_sample_rate = config.sample_rate.0;

    log::info!(
        "🔊 Output device: channels: {}, sample_rate: {:?}",
        output_channels,
        config.sample_rate
    );

    Ok(OutputConfig {
        device,
        config,
        sample_format,
        output_channels,
        output_sample_rate,
    })
}

/// Transport fields shared between the control side, the decoder thread and
/// the output callback. Floats are stored as their bit patterns.
pub struct PlaybackShared {
    pub playing: AtomicBool,
    pub looping: AtomicBool,
    /// Decoder reached the end of the stream and exited.
    pub drained: AtomicBool,
    rate: AtomicU64,
    position: AtomicU64,
    // NaN while unknown.
    duration: AtomicU64,
}

impl Default for PlaybackShared {
    fn default() -> Self {
        Self {
            playing: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            drained: AtomicBool::new(false),
            rate: AtomicU64::new(1.0f64.to_bits()),
            position: AtomicU64::new(0.0f64.to_bits()),
            duration: AtomicU64::new(f64::NAN.to_bits()),
        }
    }
}

impl PlaybackShared {
    pub fn rate(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Relaxed))
    }

    pub fn set_rate(&self, rate: f64) {
        self.rate.store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    pub fn set_position(&self, secs: f64) {
        self.position.store(secs.to_bits(), Ordering::Relaxed);
    }

    pub fn duration(&self) -> Option<f64> {
        let d = f64::from_bits(self.duration.load(Ordering::Relaxed));
        if d.is_nan() { None } else { Some(d) }
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        let bits = duration.unwrap_or(f64::NAN).to_bits();
        self.duration.store(bits, Ordering::Relaxed);
    }

    /// Forgets the previous source: stopped, at 0, duration unknown. Rate and
    /// loop are kept.
    pub fn reset_for_load(&self) {
        self.playing.store(false, Ordering::Relaxed);
        self.drained.store(false, Ordering::Relaxed);
        self.set_position(0.0);
        self.set_duration(None);
    }

    /// Moves the media clock forward by `frames` output frames.
    fn advance(&self, frames: usize, output_sample_rate: u32) {
        let mut pos = self.position() + frames as f64 * self.rate() / output_sample_rate as f64;
        if let Some(d) = self.duration().filter(|d| *d > 0.0) {
            if pos >= d {
                pos = if self.looping.load(Ordering::Relaxed) { pos % d } else { d };
            }
        }
        self.set_position(pos);
    }
}

/// Build CPAL output stream.
pub fn build_stream<T, C>(
    device: &cpal::Device,
    config: &StreamConfig,
    shared: Arc<PlaybackShared>,
    mut consumer: C,
    err_fn: fn(cpal::StreamError),
) -> Result<Stream, anyhow::Error>
where
    T: cpal::Sample + cpal::FromSample<f32> + SizedSample,
    C: Consumer<Item = f32> + Send + 'static,
{
    let channels = config.channels as usize;
    let output_sample_rate = config.sample_rate.0;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let playing = shared.playing.load(Ordering::Relaxed);

                for out in data.iter_mut() {
                    let s = if playing {
                        consumer.try_pop().unwrap_or(0.0)
                    } else {
                        0.0
                    };
                    *out = T::from_sample(s);
                }

                if !playing {
                    return;
                }
                shared.advance(data.len() / channels.max(1), output_sample_rate);

                // Everything decoded has been heard: the track ended.
                if shared.drained.load(Ordering::Relaxed) && consumer.is_empty() {
                    shared.playing.store(false, Ordering::Relaxed);
                    if let Some(d) = shared.duration() {
                        shared.set_position(d);
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_scales_with_rate() {
        let shared = PlaybackShared::default();
        shared.set_rate(2.0);
        shared.advance(48_000, 48_000);
        assert!((shared.position() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_advance_wraps_or_stops_at_duration() {
        let shared = PlaybackShared::default();
        shared.set_duration(Some(1.5));
        shared.advance(96_000, 48_000);
        assert_eq!(shared.position(), 1.5);

        shared.set_position(0.0);
        shared.looping.store(true, Ordering::Relaxed);
        shared.advance(96_000, 48_000);
        assert!((shared.position() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_reset_for_load_forgets_previous_track() {
        let shared = PlaybackShared::default();
        shared.playing.store(true, Ordering::Relaxed);
        shared.drained.store(true, Ordering::Relaxed);
        shared.looping.store(true, Ordering::Relaxed);
        shared.set_rate(2.0);
        shared.set_position(42.0);
        shared.set_duration(Some(180.0));

        shared.reset_for_load();

        assert!(!shared.playing.load(Ordering::Relaxed));
        assert!(!shared.drained.load(Ordering::Relaxed));
        assert_eq!(shared.position(), 0.0);
        assert_eq!(shared.duration(), None);
        assert_eq!(shared.rate(), 2.0);
        assert!(shared.looping.load(Ordering::Relaxed));
    }

    #[test]
    fn test_unknown_duration_round_trip() {
        let shared = PlaybackShared::default();
        assert_eq!(shared.duration(), None);
        shared.set_duration(Some(3.25));
        assert_eq!(shared.duration(), Some(3.25));
        shared.set_duration(None);
        assert_eq!(shared.duration(), None);
    }
}
