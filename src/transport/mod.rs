// src/transport/mod.rs

pub mod clock;

pub use clock::ClockTransport;

use crate::error::Result;

/// Rate every transport starts at.
pub const DEFAULT_PLAYBACK_RATE: f64 = 1.0;

/// Point-in-time copy of everything the renderer needs from a transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportState {
    pub current_time: f64,
    /// `None` until the source's metadata is known.
    pub duration: Option<f64>,
    pub paused: bool,
    pub playback_rate: f64,
    pub looping: bool,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: None,
            paused: true,
            playback_rate: DEFAULT_PLAYBACK_RATE,
            looping: false,
        }
    }
}

impl TransportState {
    /// Position as a fraction of the duration, 0 while the duration is unknown.
    pub fn progress(&self) -> f64 {
        match known_duration(self.duration) {
            Some(duration) => (self.current_time / duration).clamp(0.0, 1.0),
            None => 0.0,
        }
    }
}

/// A duration usable as a divisor: known, finite and positive.
pub fn known_duration(duration: Option<f64>) -> Option<f64> {
    duration.filter(|d| d.is_finite() && *d > 0.0)
}

/// Playback engine the widget drives.
///
/// All methods take `&self`: implementations keep their state behind atomics
/// or locks so the render loop can poll from another task while controls write.
pub trait Transport: Send + Sync {
    /// Points the transport at a new source. Position resets to 0, playback
    /// pauses and the duration becomes unknown until metadata arrives. The
    /// same holds when the new source fails to open.
    ///
    /// May block while the source is opened: `AudioPlayer` probes the file and
    /// waits for its output stream before returning. Keep it off async worker
    /// threads, e.g. behind `tokio::task::block_in_place` or `spawn_blocking`.
    fn load(&self, locator: &str) -> anyhow::Result<()>;

    fn current_time(&self) -> f64;
    fn set_current_time(&self, secs: f64);

    fn duration(&self) -> Option<f64>;

    /// Duration learned from a full decode. Transports that already know their
    /// duration may ignore it.
    fn report_duration(&self, _secs: f64) {}

    fn paused(&self) -> bool;

    /// Starts playback. Fails with `PlayerError::PlaybackBlocked` when the
    /// transport cannot play right now.
    fn play(&self) -> Result<()>;
    fn pause(&self);

    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);

    fn looping(&self) -> bool;
    fn set_looping(&self, looping: bool);

    fn snapshot(&self) -> TransportState {
        TransportState {
            current_time: self.current_time(),
            duration: self.duration(),
            paused: self.paused(),
            playback_rate: self.playback_rate(),
            looping: self.looping(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_with_known_duration() {
        let state = TransportState {
            current_time: 30.0,
            duration: Some(120.0),
            ..Default::default()
        };
        assert_eq!(state.progress(), 0.25);
    }

    #[test]
    fn test_progress_is_zero_without_usable_duration() {
        for duration in [None, Some(0.0), Some(f64::NAN), Some(f64::INFINITY)] {
            let state = TransportState {
                current_time: 3.0,
                duration,
                ..Default::default()
            };
            assert_eq!(state.progress(), 0.0);
        }
    }

    #[test]
    fn test_progress_is_clamped() {
        let state = TransportState {
            current_time: 12.0,
            duration: Some(10.0),
            ..Default::default()
        };
        assert_eq!(state.progress(), 1.0);
    }
}
