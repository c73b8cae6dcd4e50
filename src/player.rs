// src/player.rs

use crate::audio::{build_stream, setup_output_device, OutputConfig, PlaybackShared};
use crate::decoder::{spawn_decoder, DecoderCmd};
use crate::error::{PlayerError, Result};
use crate::transport::Transport;
use anyhow::Context;
use cpal::traits::StreamTrait;
use cpal::SampleFormat;
use ringbuf::{traits::Split, HeapRb};
use std::fs::File;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
    Arc, Mutex, MutexGuard,
};
use std::thread::JoinHandle;
use std::time::Duration;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::default::get_probe;

/// Samples buffered between decoder and device. Small enough that a seek or
/// rate change is heard quickly.
const RING_CAPACITY: usize = 16_384;

/// One loaded source: a decoder thread feeding an output-stream thread.
struct PlaybackSession {
    locator: String,
    stop: Arc<AtomicBool>,
    decoder_tx: Sender<DecoderCmd>,
    stream_stop_tx: Sender<()>,
    _decoder_handle: JoinHandle<()>,
    _stream_handle: JoinHandle<()>,
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.decoder_tx.send(DecoderCmd::Stop);
        let _ = self.stream_stop_tx.send(());
    }
}

/// Transport backed by the default cpal output device.
///
/// The cpal stream is created and dropped on its own thread so the player
/// itself stays `Send + Sync`; every transport field is an atomic in
/// [`PlaybackShared`].
pub struct AudioPlayer {
    shared: Arc<PlaybackShared>,
    session: Mutex<Option<PlaybackSession>>,
}

impl AudioPlayer {
    /// Checks that an output device exists; sources are opened by `load`.
    pub fn new() -> anyhow::Result<Self> {
        setup_output_device().context("opening audio output")?;
        Ok(Self {
            shared: Arc::new(PlaybackShared::default()),
            session: Mutex::new(None),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<PlaybackSession>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn start_session(&self, locator: &str) -> anyhow::Result<PlaybackSession> {
        let path = PathBuf::from(locator.strip_prefix("file://").unwrap_or(locator));

        // --- 1. Probe File ---
        let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let probed = get_probe().format(
            &Default::default(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let track = probed
            .format
            .default_track()
            .context("no default audio track found")?;
        let source_sample_rate = track
            .codec_params
            .sample_rate
            .context("missing sample rate")?;
        let duration = track
            .codec_params
            .n_frames
            .map(|n| n as f64 / source_sample_rate as f64);

        log::info!(
            "🎧 File info: sample_rate: {}, duration: {:?}",
            source_sample_rate,
            duration
        );

        self.shared.reset_for_load();
        self.shared.set_duration(duration);

        // --- 2. Ring buffer ---
        let (producer, consumer) = HeapRb::<f32>::new(RING_CAPACITY).split();

        // --- 3. Output stream on its own thread ---
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(usize, u32), String>>();
        let (stream_stop_tx, stream_stop_rx) = mpsc::channel::<()>();
        let shared = self.shared.clone();
        let stream_handle = std::thread::Builder::new()
            .name("audio-plus-output".into())
            .spawn(move || {
                let err_fn = |err: cpal::StreamError| log::error!("An error occurred on the output audio stream: {err}");
                let stream = setup_output_device().and_then(|output| {
                    let OutputConfig {
                        device,
                        config,
                        sample_format,
                        output_channels,
                        output_sample_rate,
                    } = output;
                    let stream = match sample_format {
                        SampleFormat::F32 => {
                            build_stream::<f32, _>(&device, &config, shared, consumer, err_fn)?
                        }
                        SampleFormat::I16 => {
                            build_stream::<i16, _>(&device, &config, shared, consumer, err_fn)?
                        }
                        SampleFormat::U16 => {
                            build_stream::<u16, _>(&device, &config, shared, consumer, err_fn)?
                        }
                        _ => anyhow::bail!("Unsupported sample format: {:?}", sample_format),
                    };
                    stream.play()?;
                    Ok((stream, output_channels, output_sample_rate))
                });

                match stream {
                    Ok((stream, channels, rate)) => {
                        let _ = ready_tx.send(Ok((channels, rate)));
                        // Parked until the session is dropped.
                        let _ = stream_stop_rx.recv();
                        drop(stream);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                    }
                }
            })?;

        let (output_channels, output_sample_rate) = ready_rx
            .recv()
            .context("output thread exited early")?
            .map_err(|e| anyhow::anyhow!(e))?;

        // --- 4. Decoder ---
        let stop = Arc::new(AtomicBool::new(false));
        let (decoder_handle, decoder_tx) = spawn_decoder(
            path,
            producer,
            self.shared.clone(),
            stop.clone(),
            output_channels,
            output_sample_rate,
        )?;

        Ok(PlaybackSession {
            locator: locator.to_string(),
            stop,
            decoder_tx,
            stream_stop_tx,
            _decoder_handle: decoder_handle,
            _stream_handle: stream_handle,
        })
    }

    /// Restarts the current source if its decoder already ran to the end.
    fn revive(&self, session: &mut Option<PlaybackSession>) -> anyhow::Result<()> {
        if !self.shared.drained.load(Ordering::Relaxed) {
            return Ok(());
        }
        let Some(locator) = session.as_ref().map(|s| s.locator.clone()) else {
            return Ok(());
        };
        *session = None;
        *session = Some(self.start_session(&locator)?);
        Ok(())
    }
}

impl Transport for AudioPlayer {
    fn load(&self, locator: &str) -> anyhow::Result<()> {
        let mut session = self.lock();
        // Tear the old session down before opening the device again. If the new
        // source fails to open, nothing of the old one may linger.
        *session = None;
        self.shared.reset_for_load();
        *session = Some(self.start_session(locator)?);
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.shared.position()
    }

    fn set_current_time(&self, secs: f64) {
        let mut session = self.lock();
        if let Err(e) = self.revive(&mut session) {
            log::warn!("⚠️ could not reopen source for seek: {e}");
            return;
        }
        let Some(active) = session.as_ref() else {
            return;
        };
        let upper = self.shared.duration().unwrap_or(f64::INFINITY);
        let target = secs.clamp(0.0, upper);
        if active
            .decoder_tx
            .send(DecoderCmd::Seek(Duration::from_secs_f64(target)))
            .is_ok()
        {
            // Update UI time immediately for responsiveness.
            self.shared.set_position(target);
        }
    }

    fn duration(&self) -> Option<f64> {
        self.shared.duration()
    }

    fn report_duration(&self, secs: f64) {
        if self.shared.duration().is_none() && secs.is_finite() && secs > 0.0 {
            self.shared.set_duration(Some(secs));
        }
    }

    fn paused(&self) -> bool {
        !self.shared.playing.load(Ordering::Relaxed)
    }

    fn play(&self) -> Result<()> {
        let mut session = self.lock();
        if session.is_none() {
            return Err(PlayerError::PlaybackBlocked("no source loaded".into()));
        }
        if self.shared.drained.load(Ordering::Relaxed) {
            self.revive(&mut session)
                .map_err(|e| PlayerError::PlaybackBlocked(e.to_string()))?;
        }
        self.shared.playing.store(true, Ordering::Relaxed);
        log::debug!("▶️ Playing");
        Ok(())
    }

    fn pause(&self) {
        self.shared.playing.store(false, Ordering::Relaxed);
        log::debug!("⏸️ Paused");
    }

    fn playback_rate(&self) -> f64 {
        self.shared.rate()
    }

    fn set_playback_rate(&self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.shared.set_rate(rate);
        } else {
            log::warn!("⚠️ ignoring playback rate {rate}");
        }
    }

    fn looping(&self) -> bool {
        self.shared.looping.load(Ordering::Relaxed)
    }

    fn set_looping(&self, looping: bool) {
        self.shared.looping.store(looping, Ordering::Relaxed);
    }
}
