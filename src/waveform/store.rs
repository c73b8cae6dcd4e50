// src/waveform/store.rs

use std::sync::{Arc, Mutex, MutexGuard};

/// Identifies one waveform build. A ticket stays valid until the store is
/// invalidated or resized again; commits from older tickets are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTicket {
    pub generation: u64,
    pub locator: String,
    pub bars: usize,
}

#[derive(Default)]
struct StoreInner {
    generation: u64,
    locator: Option<String>,
    bars: usize,
    peaks: Option<Arc<Vec<f32>>>,
    // Decoded reference channel of `locator`, kept so a resize only re-extracts.
    samples: Option<Arc<Vec<f32>>>,
}

/// Holds the peak sequence for the active locator.
///
/// The build path is the only writer; the render loop takes an `Arc` snapshot
/// per frame through [`WaveformStore::peaks`].
#[derive(Default)]
pub struct WaveformStore {
    inner: Mutex<StoreInner>,
}

impl WaveformStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Switches to a new locator. Peaks and cached samples of the previous one
    /// are dropped right away so they can never be drawn against the new source.
    /// Returns `None` when there is nothing to build (no locator).
    pub fn invalidate(&self, locator: Option<&str>, bars: usize) -> Option<BuildTicket> {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.locator = locator.map(str::to_owned);
        inner.bars = bars;
        inner.peaks = None;
        inner.samples = None;
        let generation = inner.generation;
        inner.locator.clone().map(|locator| BuildTicket {
            generation,
            locator,
            bars,
        })
    }

    /// Starts a rebuild at a new bar count for the same locator. The current
    /// peaks stay visible until the rebuild commits.
    pub fn resize(&self, bars: usize) -> Option<BuildTicket> {
        let mut inner = self.lock();
        if inner.bars == bars {
            return None;
        }
        inner.generation += 1;
        inner.bars = bars;
        let generation = inner.generation;
        inner.locator.clone().map(|locator| BuildTicket {
            generation,
            locator,
            bars,
        })
    }

    pub fn is_current(&self, ticket: &BuildTicket) -> bool {
        self.lock().generation == ticket.generation
    }

    /// Cached reference channel, if the ticket's locator was already decoded.
    pub fn cached_samples(&self, ticket: &BuildTicket) -> Option<Arc<Vec<f32>>> {
        let inner = self.lock();
        if inner.locator.as_deref() == Some(ticket.locator.as_str()) {
            inner.samples.clone()
        } else {
            None
        }
    }

    /// Keeps the decoded reference channel for later resizes. Samples for a
    /// locator that is no longer active are discarded.
    pub fn cache_samples(&self, ticket: &BuildTicket, samples: Arc<Vec<f32>>) -> bool {
        let mut inner = self.lock();
        if inner.locator.as_deref() != Some(ticket.locator.as_str()) {
            return false;
        }
        inner.samples = Some(samples);
        true
    }

    /// Publishes the peaks of a finished build. Returns `false` and leaves the
    /// store untouched when the ticket has been superseded.
    pub fn commit(&self, ticket: &BuildTicket, peaks: Vec<f32>) -> bool {
        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            return false;
        }
        inner.peaks = Some(Arc::new(peaks));
        true
    }

    /// Peaks for the current frame, `None` while no build has completed.
    pub fn peaks(&self) -> Option<Arc<Vec<f32>>> {
        self.lock().peaks.clone()
    }

    pub fn locator(&self) -> Option<String> {
        self.lock().locator.clone()
    }

    pub fn bars(&self) -> usize {
        self.lock().bars
    }
}
