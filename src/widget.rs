// src/widget.rs

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::WidgetConfig;
use crate::controller::{PlayGlyph, TransportController};
use crate::error::Result;
use crate::menu::{MenuEntry, MenuState, SpeedMenu};
use crate::render::{RenderLoop, Renderer, Surface, SurfaceSize};
use crate::source::AudioSource;
use crate::transport::Transport;
use crate::waveform::{extract_peaks, BuildTicket, WaveformStore};

/// Pointer and control input, in surface pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PlayButton,
    PrimaryClick { x: f64, y: f64 },
    SecondaryClick { x: f64, y: f64 },
    SelectRate(f64),
    ToggleLoop,
}

/// What the host should do with an event after the widget handled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    /// `false` when the event must not reach outer handlers (e.g. a global
    /// close-on-click listener) in the same dispatch.
    pub propagate: bool,
}

impl EventOutcome {
    const PROPAGATE: Self = Self { propagate: true };
    const CONSUMED: Self = Self { propagate: false };
}

/// The audio player widget: waveform, transport controls and speed menu.
pub struct AudioPlus {
    config: WidgetConfig,
    source: Arc<dyn AudioSource>,
    transport: Arc<dyn Transport>,
    store: Arc<WaveformStore>,
    controller: TransportController,
    menu: Arc<Mutex<SpeedMenu>>,
    size: SurfaceSize,
    runtime: Handle,
    render_loop: Option<RenderLoop>,
    attached: bool,
}

impl AudioPlus {
    /// Must be called inside a tokio runtime; builds and the render loop run on it.
    pub fn new(
        config: WidgetConfig,
        source: Arc<dyn AudioSource>,
        transport: Arc<dyn Transport>,
    ) -> anyhow::Result<Self> {
        let runtime = Handle::try_current().context("AudioPlus needs a tokio runtime")?;
        let menu = SpeedMenu::new(&config.speed_options, config.menu);
        Ok(Self {
            controller: TransportController::new(transport.clone()),
            menu: Arc::new(Mutex::new(menu)),
            store: Arc::new(WaveformStore::new()),
            size: SurfaceSize::default(),
            render_loop: None,
            attached: false,
            config,
            source,
            transport,
            runtime,
        })
    }

    fn menu(&self) -> MutexGuard<'_, SpeedMenu> {
        self.menu.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<WaveformStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn glyph(&self) -> PlayGlyph {
        self.controller.glyph()
    }

    /// Re-reads the play glyph, e.g. once playback has run out on its own.
    pub fn refresh_glyph(&mut self) -> PlayGlyph {
        self.controller.refresh()
    }

    pub fn menu_state(&self) -> MenuState {
        self.menu().state()
    }

    pub fn close_menu(&mut self) {
        self.menu().close();
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// A read-only painter over this widget's state.
    pub fn renderer(&self) -> Renderer {
        Renderer::new(
            self.store.clone(),
            self.transport.clone(),
            self.menu.clone(),
            self.config.palette,
        )
    }

    /// Changes the audio shown and played. Before `attach` this only records
    /// the locator. Returns the spawned waveform build, if any.
    ///
    /// Blocks for as long as `Transport::load` does, see `attach`.
    pub fn set_source(&mut self, source: Option<String>) -> Option<JoinHandle<()>> {
        self.config.source = source;
        if !self.attached {
            return None;
        }
        self.load_source()
    }

    fn load_source(&mut self) -> Option<JoinHandle<()>> {
        let locator = self.config.source.clone();
        if let Some(locator) = &locator {
            if let Err(e) = self.transport.load(locator) {
                log::warn!("⚠️ Transport could not load {locator}: {e:#}");
            }
            log::info!("🎵 Source: {locator}");
        }
        self.controller.refresh();
        self.menu().sync(self.transport.as_ref());

        let ticket = self.store.invalidate(locator.as_deref(), self.size.width)?;
        self.spawn_build(ticket)
    }

    /// New surface size in device pixels. A width change re-extracts the peaks.
    pub fn resize(&mut self, width: usize, height: usize) -> Option<JoinHandle<()>> {
        self.size = SurfaceSize::new(width, height);
        let ticket = self.store.resize(width)?;
        self.spawn_build(ticket)
    }

    /// Resize from a logical box and a device pixel ratio.
    pub fn resize_logical(&mut self, width: f64, height: f64, scale: f64) -> Option<JoinHandle<()>> {
        let size = SurfaceSize::from_logical(width, height, scale);
        self.resize(size.width, size.height)
    }

    fn spawn_build(&self, ticket: BuildTicket) -> Option<JoinHandle<()>> {
        if ticket.bars == 0 {
            return None;
        }
        log::debug!(
            "🌊 Building waveform for {} ({} bars, gen {})",
            ticket.locator,
            ticket.bars,
            ticket.generation
        );
        Some(self.runtime.spawn(build_waveform(
            self.source.clone(),
            self.store.clone(),
            self.transport.clone(),
            ticket,
        )))
    }

    /// Binds the widget to a surface: sizes from it, loads the configured
    /// source and starts repainting.
    ///
    /// The transport load runs on the calling thread and may block while the
    /// source is opened. Call from a blocking context, or use a transport
    /// whose `load` returns at once.
    pub fn attach<S: Surface + 'static>(&mut self, surface: Arc<Mutex<S>>) -> Option<JoinHandle<()>> {
        self.detach();
        {
            let target = surface.lock().unwrap_or_else(|p| p.into_inner());
            self.size = SurfaceSize::new(target.width(), target.height());
        }
        self.menu().bind(self.transport.as_ref());
        self.attached = true;

        let build = self.load_source();
        let _guard = self.runtime.enter();
        self.render_loop = Some(RenderLoop::spawn(
            self.renderer(),
            surface,
            self.config.frame_interval(),
        ));
        build
    }

    /// Stops the render loop. In-flight builds still commit into the store.
    pub fn detach(&mut self) {
        if let Some(render_loop) = self.render_loop.take() {
            render_loop.cancel();
            log::debug!("🛑 Render loop stopped after {} frames", render_loop.frames());
        }
        self.attached = false;
    }

    /// Applies a rate from outside the menu, keeping the menu marker in step.
    pub fn set_playback_rate(&mut self, rate: f64) {
        self.transport.set_playback_rate(rate);
        self.menu().sync(self.transport.as_ref());
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.transport.set_looping(looping);
        self.menu().sync(self.transport.as_ref());
    }

    /// Routes one input event. Only `PlaybackBlocked` from the play button and
    /// invalid rates from a menu selection come back as errors.
    pub fn dispatch(&mut self, event: InputEvent) -> Result<EventOutcome> {
        let outcome = self.handle(event);
        self.menu().sync(self.transport.as_ref());
        outcome
    }

    fn on_surface(&self, x: f64, y: f64) -> bool {
        (0.0..self.size.width as f64).contains(&x) && (0.0..self.size.height as f64).contains(&y)
    }

    fn handle(&mut self, event: InputEvent) -> Result<EventOutcome> {
        match event {
            InputEvent::PlayButton => {
                self.menu().close();
                self.controller.toggle_playback()?;
            }
            InputEvent::PrimaryClick { x, y } => {
                let hit = {
                    let menu = self.menu();
                    menu.contains(x, y).then(|| menu.hit_test(x, y))
                };
                match hit {
                    // Headers and separators swallow the click.
                    Some(Some(MenuEntry::Speed(rate))) => {
                        self.menu().select_rate(rate, self.transport.as_ref())?;
                    }
                    Some(Some(MenuEntry::Loop)) => {
                        self.menu().toggle_loop(self.transport.as_ref());
                    }
                    Some(_) => {}
                    None => {
                        self.menu().close();
                        if (0.0..self.size.height as f64).contains(&y) {
                            self.controller.seek(x, self.size.width);
                        }
                    }
                }
            }
            InputEvent::SecondaryClick { x, y } => {
                // Only a click on the waveform opens the menu.
                if !self.on_surface(x, y) {
                    return Ok(EventOutcome::PROPAGATE);
                }
                self.menu().open(x.floor() as i32, y.floor() as i32);
                return Ok(EventOutcome::CONSUMED);
            }
            InputEvent::SelectRate(rate) => {
                self.menu().select_rate(rate, self.transport.as_ref())?;
            }
            InputEvent::ToggleLoop => {
                self.menu().toggle_loop(self.transport.as_ref());
            }
        }
        Ok(EventOutcome::PROPAGATE)
    }
}

impl Drop for AudioPlus {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Fetches, decodes and extracts the peaks for `ticket`, then commits them.
/// Failures are logged and leave the store as it was.
pub async fn build_waveform(
    source: Arc<dyn AudioSource>,
    store: Arc<WaveformStore>,
    transport: Arc<dyn Transport>,
    ticket: BuildTicket,
) {
    let samples = match store.cached_samples(&ticket) {
        Some(samples) => samples,
        None => {
            let bytes = match source.fetch_bytes(&ticket.locator).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("⚠️ No waveform for {}: {e}", ticket.locator);
                    return;
                }
            };
            let decoded = match source.decode(bytes).await {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::warn!("⚠️ No waveform for {}: {e}", ticket.locator);
                    return;
                }
            };
            // Keyed on the locator: a resize while decoding still owns this source.
            if store.locator().as_deref() == Some(ticket.locator.as_str()) {
                transport.report_duration(decoded.duration);
            }
            let samples = Arc::new(decoded.into_reference_channel());
            store.cache_samples(&ticket, samples.clone());
            samples
        }
    };

    let bars = ticket.bars;
    let peaks = match tokio::task::spawn_blocking(move || extract_peaks(&samples, bars)).await {
        Ok(Ok(peaks)) => peaks,
        Ok(Err(e)) => {
            log::warn!("⚠️ Peak extraction failed for {}: {e}", ticket.locator);
            return;
        }
        Err(e) => {
            log::warn!("⚠️ Peak extraction task failed: {e}");
            return;
        }
    };

    if store.commit(&ticket, peaks) {
        log::info!("🌊 Waveform ready: {} ({} bars)", ticket.locator, bars);
    } else {
        log::debug!("🗑️ Discarded stale waveform for {} (gen {})", ticket.locator, ticket.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlayerError;
    use crate::render::PixelSurface;
    use crate::source::DecodedAudio;
    use crate::transport::ClockTransport;
    use async_trait::async_trait;

    /// Serves fixed samples for every locator.
    struct StaticSource(Vec<f32>);

    #[async_trait]
    impl AudioSource for StaticSource {
        async fn fetch_bytes(&self, locator: &str) -> Result<Vec<u8>> {
            if locator == "missing.wav" {
                return Err(PlayerError::Network {
                    locator: locator.into(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            Ok(Vec::new())
        }

        async fn decode(&self, _bytes: Vec<u8>) -> Result<DecodedAudio> {
            Ok(DecodedAudio {
                channels: vec![self.0.clone()],
                sample_rate: 8,
                duration: self.0.len() as f64 / 8.0,
            })
        }
    }

    fn widget(samples: Vec<f32>) -> (AudioPlus, Arc<ClockTransport>) {
        let transport = Arc::new(ClockTransport::new());
        let widget = AudioPlus::new(
            WidgetConfig::with_source("a.wav"),
            Arc::new(StaticSource(samples)),
            transport.clone(),
        )
        .unwrap();
        (widget, transport)
    }

    #[tokio::test]
    async fn test_attach_builds_peaks_and_learns_duration() {
        let (mut widget, transport) = widget(vec![0.0, 0.0, 0.0, 0.0, 1.0, -1.0, 1.0, -1.0]);
        let surface = Arc::new(Mutex::new(PixelSurface::new(2, 4)));
        widget.attach(surface).unwrap().await.unwrap();

        assert_eq!(widget.store().peaks().unwrap().as_slice(), &[0.0, 1.0]);
        assert_eq!(transport.duration(), Some(1.0));
        assert!(widget.is_attached());
    }

    #[tokio::test]
    async fn test_source_before_attach_is_only_recorded() {
        let (mut widget, transport) = widget(vec![0.5; 8]);
        assert!(widget.set_source(Some("b.wav".into())).is_none());
        assert!(transport.locator().is_none());
        assert_eq!(widget.config().source.as_deref(), Some("b.wav"));
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_store_empty() {
        let (mut widget, _transport) = widget(vec![0.5; 8]);
        widget.attach(Arc::new(Mutex::new(PixelSurface::new(2, 4))));
        widget.set_source(Some("missing.wav".into())).unwrap().await.unwrap();
        assert!(widget.store().peaks().is_none());
    }

    #[tokio::test]
    async fn test_resize_reextracts_from_cache() {
        let (mut widget, _transport) = widget(vec![0.5; 16]);
        widget
            .attach(Arc::new(Mutex::new(PixelSurface::new(2, 4))))
            .unwrap()
            .await
            .unwrap();
        widget.resize(8, 4).unwrap().await.unwrap();
        assert_eq!(widget.store().peaks().unwrap().len(), 8);
        assert!(widget.resize(8, 10).is_none());

        widget.resize_logical(6.0, 2.0, 2.0).unwrap().await.unwrap();
        assert_eq!(widget.size(), SurfaceSize::new(12, 4));
        assert_eq!(widget.store().peaks().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_menu_flow_through_dispatch() {
        let (mut widget, transport) = widget(vec![0.5; 8]);
        widget.attach(Arc::new(Mutex::new(PixelSurface::new(200, 400))));

        let outcome = widget.dispatch(InputEvent::SecondaryClick { x: 10.0, y: 20.0 }).unwrap();
        assert!(!outcome.propagate);
        assert_eq!(widget.menu_state(), MenuState::Open { anchor_x: 10, anchor_y: 20 });

        // Row 8 of the default layout is the 2× entry.
        widget.dispatch(InputEvent::PrimaryClick { x: 15.0, y: 20.0 + 8.0 * 28.0 + 3.0 }).unwrap();
        assert_eq!(transport.playback_rate(), 2.0);
        assert_eq!(widget.menu_state(), MenuState::Closed);

        widget.dispatch(InputEvent::SecondaryClick { x: 0.0, y: 0.0 }).unwrap();
        widget.dispatch(InputEvent::ToggleLoop).unwrap();
        assert!(transport.looping());
        assert!(matches!(widget.menu_state(), MenuState::Open { .. }));

        // Outside click closes the menu without touching the rate.
        widget.dispatch(InputEvent::PrimaryClick { x: 190.0, y: 10.0 }).unwrap();
        assert_eq!(widget.menu_state(), MenuState::Closed);
        assert_eq!(transport.playback_rate(), 2.0);
    }

    #[tokio::test]
    async fn test_secondary_click_off_surface_leaves_menu_closed() {
        let (mut widget, _transport) = widget(vec![0.5; 8]);
        widget.attach(Arc::new(Mutex::new(PixelSurface::new(10, 4))));

        for (x, y) in [(500.0, 900.0), (5.0, 3e9), (-1.0, 2.0), (10.0, 0.0), (f64::NAN, 1.0)] {
            let outcome = widget.dispatch(InputEvent::SecondaryClick { x, y }).unwrap();
            assert!(outcome.propagate);
            assert_eq!(widget.menu_state(), MenuState::Closed);
        }

        let mut pixels = PixelSurface::new(10, 4);
        widget.renderer().draw(&mut pixels);
        assert!(pixels.labels().is_empty());

        // The last row and column still belong to the surface.
        widget.dispatch(InputEvent::SecondaryClick { x: 9.5, y: 3.5 }).unwrap();
        assert_eq!(widget.menu_state(), MenuState::Open { anchor_x: 9, anchor_y: 3 });
    }

    #[tokio::test]
    async fn test_rate_from_outside_resyncs_menu() {
        let (mut widget, _transport) = widget(vec![0.5; 8]);
        widget.attach(Arc::new(Mutex::new(PixelSurface::new(20, 4))));
        widget.set_playback_rate(4.0);
        assert_eq!(widget.menu().active_rate(), Some(4.0));
        widget.set_looping(true);
        assert!(widget.menu().loop_active());
    }

    #[tokio::test]
    async fn test_detach_stops_render_loop() {
        let (mut widget, _transport) = widget(vec![0.5; 8]);
        widget.attach(Arc::new(Mutex::new(PixelSurface::new(2, 4))));
        assert!(widget.render_loop.is_some());
        widget.detach();
        assert!(widget.render_loop.is_none());
        assert!(!widget.is_attached());
    }
}
