// src/transport/clock.rs

use std::sync::{Mutex, MutexGuard};

use tokio::time::Instant;

use super::{known_duration, Transport, DEFAULT_PLAYBACK_RATE};
use crate::error::{PlayerError, Result};

struct ClockState {
    locator: Option<String>,
    duration: Option<f64>,
    playing: bool,
    rate: f64,
    looping: bool,
    autoplay_blocked: bool,
    // Position at `anchor`; while playing the clock runs from here.
    anchor_pos: f64,
    anchor: Instant,
}

impl ClockState {
    fn position_at(&self, now: Instant) -> f64 {
        if !self.playing {
            return self.anchor_pos;
        }
        let elapsed = now.saturating_duration_since(self.anchor).as_secs_f64();
        let pos = self.anchor_pos + elapsed * self.rate;
        match known_duration(self.duration) {
            Some(d) if pos >= d && self.looping => pos % d,
            Some(d) if pos >= d => d,
            _ => pos,
        }
    }

    fn ended_at(&self, now: Instant) -> bool {
        match known_duration(self.duration) {
            Some(d) => !self.looping && self.position_at(now) >= d,
            None => false,
        }
    }

    /// Folds elapsed time into the anchor so rate/loop changes apply from now on.
    fn settle(&mut self, now: Instant) {
        let ended = self.playing && self.ended_at(now);
        self.anchor_pos = self.position_at(now);
        self.anchor = now;
        if ended {
            self.playing = false;
        }
    }
}

/// Transport driven by a monotonic clock instead of an audio device.
///
/// Useful headless and in tests: under `tokio::time::pause()` the position
/// only moves when the test advances time.
pub struct ClockTransport {
    state: Mutex<ClockState>,
}

impl Default for ClockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClockState {
                locator: None,
                duration: None,
                playing: false,
                rate: DEFAULT_PLAYBACK_RATE,
                looping: false,
                autoplay_blocked: false,
                anchor_pos: 0.0,
                anchor: Instant::now(),
            }),
        }
    }

    /// A transport that already has a source of the given length loaded.
    pub fn with_duration(locator: &str, duration: f64) -> Self {
        let clock = Self::new();
        {
            let mut state = clock.lock();
            state.locator = Some(locator.to_string());
            state.duration = Some(duration);
        }
        clock
    }

    /// Makes `play()` fail the way a browser refuses autoplay.
    pub fn set_autoplay_blocked(&self, blocked: bool) {
        self.lock().autoplay_blocked = blocked;
    }

    pub fn locator(&self) -> Option<String> {
        self.lock().locator.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn settled(&self) -> MutexGuard<'_, ClockState> {
        let mut state = self.lock();
        state.settle(Instant::now());
        state
    }
}

impl Transport for ClockTransport {
    fn load(&self, locator: &str) -> anyhow::Result<()> {
        let mut state = self.lock();
        state.locator = Some(locator.to_string());
        state.duration = None;
        state.playing = false;
        state.anchor_pos = 0.0;
        state.anchor = Instant::now();
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.settled().anchor_pos
    }

    fn set_current_time(&self, secs: f64) {
        let mut state = self.settled();
        let upper = known_duration(state.duration).unwrap_or(f64::INFINITY);
        state.anchor_pos = secs.clamp(0.0, upper);
    }

    fn duration(&self) -> Option<f64> {
        self.lock().duration
    }

    fn report_duration(&self, secs: f64) {
        let mut state = self.lock();
        if state.duration.is_none() && secs.is_finite() && secs > 0.0 {
            state.duration = Some(secs);
        }
    }

    fn paused(&self) -> bool {
        !self.settled().playing
    }

    fn play(&self) -> Result<()> {
        let mut state = self.settled();
        if state.locator.is_none() {
            return Err(PlayerError::PlaybackBlocked("no source loaded".into()));
        }
        if state.autoplay_blocked {
            return Err(PlayerError::PlaybackBlocked(
                "playback must be started by a user gesture".into(),
            ));
        }
        if let Some(d) = known_duration(state.duration) {
            if state.anchor_pos >= d {
                state.anchor_pos = 0.0;
            }
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&self) {
        self.settled().playing = false;
    }

    fn playback_rate(&self) -> f64 {
        self.lock().rate
    }

    fn set_playback_rate(&self, rate: f64) {
        if !(rate.is_finite() && rate > 0.0) {
            log::warn!("⚠️ ignoring playback rate {rate}");
            return;
        }
        self.settled().rate = rate;
    }

    fn looping(&self) -> bool {
        self.lock().looping
    }

    fn set_looping(&self, looping: bool) {
        self.settled().looping = looping;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_position_follows_time_and_rate() {
        let clock = ClockTransport::with_duration("a.wav", 60.0);
        clock.play().unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!((clock.current_time() - 2.0).abs() < 1e-6);

        clock.set_playback_rate(2.0);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!((clock.current_time() - 8.0).abs() < 1e-6);

        clock.pause();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!((clock.current_time() - 8.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_end_without_loop() {
        let clock = ClockTransport::with_duration("a.wav", 5.0);
        clock.play().unwrap();
        tokio::time::advance(Duration::from_secs(7)).await;
        assert!(clock.paused());
        assert_eq!(clock.current_time(), 5.0);

        // Playing again from the end restarts.
        clock.play().unwrap();
        assert_eq!(clock.current_time(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wraps_when_looping() {
        let clock = ClockTransport::with_duration("a.wav", 4.0);
        clock.set_looping(true);
        clock.play().unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!clock.paused());
        assert!((clock.current_time() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_play_without_source_is_blocked() {
        let clock = ClockTransport::new();
        assert!(matches!(clock.play(), Err(PlayerError::PlaybackBlocked(_))));
        assert!(clock.paused());
    }

    #[test]
    fn test_autoplay_block() {
        let clock = ClockTransport::with_duration("a.wav", 4.0);
        clock.set_autoplay_blocked(true);
        assert!(matches!(clock.play(), Err(PlayerError::PlaybackBlocked(_))));
        clock.set_autoplay_blocked(false);
        assert!(clock.play().is_ok());
        assert!(!clock.paused());
    }

    #[test]
    fn test_load_resets_state() {
        let clock = ClockTransport::with_duration("a.wav", 4.0);
        clock.set_current_time(3.0);
        clock.load("b.wav").unwrap();
        assert_eq!(clock.current_time(), 0.0);
        assert_eq!(clock.duration(), None);
        assert!(clock.paused());
        clock.report_duration(9.5);
        assert_eq!(clock.duration(), Some(9.5));
        clock.report_duration(1.0);
        assert_eq!(clock.duration(), Some(9.5));
    }

    #[test]
    fn test_seek_is_clamped_and_rate_validated() {
        let clock = ClockTransport::with_duration("a.wav", 4.0);
        clock.set_current_time(10.0);
        assert_eq!(clock.current_time(), 4.0);
        clock.set_current_time(-1.0);
        assert_eq!(clock.current_time(), 0.0);
        clock.set_playback_rate(0.0);
        assert_eq!(clock.playback_rate(), 1.0);
    }
}
