// src/waveform/mod.rs

pub mod peaks;
pub mod store;

pub use peaks::{extract_peaks, PEAK_EXPONENT};
pub use store::{BuildTicket, WaveformStore};
