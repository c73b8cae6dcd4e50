// src/waveform/peaks.rs

use crate::error::{PlayerError, Result};

/// Power-law exponent applied after normalization. Values below 1 lift quiet
/// passages so they stay visible next to loud ones.
pub const PEAK_EXPONENT: f32 = 0.6;

/// Turns one channel of PCM into `bars` normalized peaks, one per device pixel.
///
/// The samples are split into `bars` equal buckets of `len / bars` samples
/// (the remainder at the end is dropped). Each bucket becomes its RMS level,
/// the levels are divided by the loudest one and then raised to
/// [`PEAK_EXPONENT`]. Every returned value is finite and within `[0, 1]`.
///
/// An empty input yields an empty sequence. `bars == 0` is rejected.
pub fn extract_peaks(samples: &[f32], bars: usize) -> Result<Vec<f32>> {
    if bars == 0 {
        return Err(PlayerError::InvalidArgument(
            "peak extraction needs at least one bar".into(),
        ));
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let bucket = samples.len() / bars;

    let mut levels = Vec::with_capacity(bars);
    for i in 0..bars {
        levels.push(bucket_rms(samples, i * bucket, bucket));
    }

    let max = levels.iter().copied().fold(0.0f64, f64::max);
    let max = if max > 0.0 { max } else { 1.0 };

    Ok(levels
        .into_iter()
        .map(|level| ((level / max) as f32).powf(PEAK_EXPONENT).clamp(0.0, 1.0))
        .collect())
}

/// RMS of `samples[start..start + len]`. Indices past the end and non-finite
/// samples count as silence; an empty bucket is silent.
fn bucket_rms(samples: &[f32], start: usize, len: usize) -> f64 {
    if len == 0 {
        return 0.0;
    }
    let mut sum = 0.0f64;
    for j in 0..len {
        let v = samples.get(start + j).copied().unwrap_or(0.0);
        if v.is_finite() {
            sum += (v as f64) * (v as f64);
        }
    }
    (sum / len as f64).sqrt()
}
