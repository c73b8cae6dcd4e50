// src/render/frame_loop.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{Renderer, Surface};

/// Repaints a surface once per tick until cancelled or dropped.
pub struct RenderLoop {
    handle: JoinHandle<()>,
    frames: Arc<AtomicU64>,
}

impl RenderLoop {
    /// Spawns the loop on the current tokio runtime.
    pub fn spawn<S: Surface + 'static>(
        renderer: Renderer,
        surface: Arc<Mutex<S>>,
        interval: Duration,
    ) -> Self {
        let frames = Arc::new(AtomicU64::new(0));
        let counter = frames.clone();
        let period = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // A slow terminal should drop frames, not replay them in a burst.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let mut target = surface.lock().unwrap_or_else(|p| p.into_inner());
                renderer.draw(&mut *target);
                if let Err(e) = target.present() {
                    log::warn!("⚠️ Frame present failed: {e:#}");
                }
                drop(target);
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        log::debug!("🎞️ Render loop started ({} ms)", period.as_millis());
        Self { handle, frames }
    }

    /// Frames painted so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::{MenuLayout, SpeedMenu, DEFAULT_SPEEDS};
    use crate::render::{Palette, PixelSurface};
    use crate::transport::{ClockTransport, Transport};
    use crate::waveform::WaveformStore;

    fn renderer(store: Arc<WaveformStore>, transport: Arc<dyn Transport>) -> Renderer {
        let menu = SpeedMenu::new(&DEFAULT_SPEEDS, MenuLayout::default());
        Renderer::new(store, transport, Arc::new(Mutex::new(menu)), Palette::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_repaints_until_cancelled() {
        let store = Arc::new(WaveformStore::new());
        let ticket = store.invalidate(Some("a.wav"), 2).unwrap();
        store.commit(&ticket, vec![0.0, 1.0]);
        let transport: Arc<dyn Transport> = Arc::new(ClockTransport::with_duration("a.wav", 4.0));
        let surface = Arc::new(Mutex::new(PixelSurface::new(2, 4)));

        let render_loop = RenderLoop::spawn(
            renderer(store, transport),
            surface.clone(),
            Duration::from_millis(16),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(render_loop.frames() >= 5);
        assert_eq!(surface.lock().unwrap().column_height(1), 4);

        render_loop.cancel();
        tokio::time::sleep(Duration::from_millis(1)).await;
        let frozen = render_loop.frames();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(render_loop.frames(), frozen);
        assert!(!render_loop.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_surface_while_peaks_missing() {
        let store = Arc::new(WaveformStore::new());
        let transport: Arc<dyn Transport> = Arc::new(ClockTransport::new());
        let surface = Arc::new(Mutex::new(PixelSurface::new(4, 4)));
        surface.lock().unwrap().fill_rect(0.0, 0.0, 4.0, 4.0, crate::render::Rgb::new(1, 1, 1));

        let _loop = RenderLoop::spawn(
            renderer(store, transport),
            surface.clone(),
            Duration::from_millis(16),
        );
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(surface.lock().unwrap().is_blank());
    }
}
