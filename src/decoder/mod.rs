// src/decoder/mod.rs

pub mod control;
pub mod dsp;
pub mod output;
pub mod resample;

use anyhow::anyhow;
use ringbuf::traits::Producer as RbProducer;
use rubato::Resampler; // for .reset()
use std::fs::File;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{channel, Receiver, Sender},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatReader, SeekMode, SeekTo};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::default::{get_codecs, get_probe};

use crate::audio::PlaybackShared;
pub use control::DecoderCmd;

/// Streams one file into the output ring buffer on its own thread.
///
/// Follows the shared playback rate by re-deriving the resampler, rewinds at
/// the end of the stream while looping, and marks the stream drained otherwise.
pub struct Decoder<P>
where
    P: RbProducer<Item = f32> + Send + 'static,
{
    path: PathBuf,
    producer: P,
    shared: Arc<PlaybackShared>,
    stop: Arc<AtomicBool>,
    output_channels: usize,
    output_sample_rate: u32,
    cmd_rx: Receiver<DecoderCmd>,
    post_seek_fade_samples: usize,
}

impl<P> Decoder<P>
where
    P: RbProducer<Item = f32> + Send + 'static,
{
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("audio-plus-decoder".into())
            .spawn(move || {
                let shared = self.shared.clone();
                if let Err(e) = self.run() {
                    log::error!("❌ Decoder thread error: {e}");
                }
                shared.drained.store(true, Ordering::Relaxed);
            })
    }

    fn push(&mut self, data: &[f32]) -> bool {
        output::push_with_fade(
            &mut self.producer,
            data,
            &mut self.post_seek_fade_samples,
            &self.stop,
        )
    }

    fn run(mut self) -> Result<(), anyhow::Error> {
        let file = File::open(&self.path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let probed = get_probe().format(
            &Default::default(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| anyhow!("no default audio track"))?;
        let track_id = track.id;
        let source_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| anyhow!("missing sample rate"))?;

        let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        let mut rate = self.shared.rate();
        let mut resampler = resample::build_resampler(
            resample::effective_source_rate(source_rate, rate),
            self.output_sample_rate,
            self.output_channels,
        )?;
        let mut stage_planar: Vec<Vec<f32>> = vec![Vec::with_capacity(4096); self.output_channels];
        let mut packets_since_rewind = 0usize;

        loop {
            while let Ok(cmd) = self.cmd_rx.try_recv() {
                match cmd {
                    DecoderCmd::Seek(target) => {
                        seek_to(format.as_mut(), track_id, target)?;
                        decoder.reset();
                        sample_buf = None;
                        for ch in &mut stage_planar {
                            ch.clear();
                        }
                        if let Some(r) = &mut resampler {
                            r.reset();
                        }
                        self.post_seek_fade_samples =
                            dsp::fade_samples_ms(self.output_sample_rate, 10) * self.output_channels;
                    }
                    DecoderCmd::Stop => return Ok(()),
                }
            }
            if self.stop.load(Ordering::Relaxed) {
                return Ok(());
            }

            let wanted = self.shared.rate();
            if wanted != rate {
                rate = wanted;
                resampler = resample::build_resampler(
                    resample::effective_source_rate(source_rate, rate),
                    self.output_sample_rate,
                    self.output_channels,
                )?;
            }

            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::ResetRequired) => break,
                Err(_) => {
                    if self.shared.looping.load(Ordering::Relaxed) && packets_since_rewind > 0 {
                        seek_to(format.as_mut(), track_id, Duration::ZERO)?;
                        decoder.reset();
                        packets_since_rewind = 0;
                        continue;
                    }
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }
            packets_since_rewind += 1;

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let decoded_ch = decoded.spec().channels.count();

                    let needs_alloc = sample_buf
                        .as_ref()
                        .is_none_or(|buf| buf.capacity() < decoded.capacity());
                    if needs_alloc {
                        sample_buf = Some(SampleBuffer::<f32>::new(
                            decoded.capacity() as u64,
                            *decoded.spec(),
                        ));
                    }
                    let Some(buf) = sample_buf.as_mut() else {
                        continue;
                    };
                    buf.copy_interleaved_ref(decoded);

                    let mixed = dsp::updown_mix_interleaved(
                        buf.samples(),
                        decoded_ch,
                        self.output_channels,
                    );

                    match resampler.as_mut() {
                        Some(r) => {
                            dsp::append_interleaved_to_planar(&mixed, &mut stage_planar);
                            while let Some(out_block) =
                                resample::try_process_exact(r, &mut stage_planar)
                            {
                                let interleaved = dsp::interleave(&out_block);
                                if !self.push(&interleaved) {
                                    return Ok(());
                                }
                            }
                        }
                        None => {
                            if !self.push(&mixed) {
                                return Ok(());
                            }
                        }
                    }
                }
                Err(SymphoniaError::IoError(_)) => continue,
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(_) => break,
            }

            if !self.shared.playing.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(10));
            }
        }

        if let Some(r) = &mut resampler {
            for block in resample::flush(r, &mut stage_planar)? {
                if !self.push(&dsp::interleave(&block)) {
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

fn seek_to(format: &mut dyn FormatReader, track_id: u32, target: Duration) -> Result<(), anyhow::Error> {
    let time = symphonia::core::units::Time::new(
        target.as_secs(),
        target.subsec_nanos() as f64 / 1_000_000_000f64,
    );
    format.seek(
        SeekMode::Accurate,
        SeekTo::Time {
            time,
            track_id: Some(track_id),
        },
    )?;
    Ok(())
}

/// Starts a decoder thread for `path` and returns its command channel.
pub fn spawn_decoder<P>(
    path: PathBuf,
    producer: P,
    shared: Arc<PlaybackShared>,
    stop: Arc<AtomicBool>,
    output_channels: usize,
    output_sample_rate: u32,
) -> std::io::Result<(JoinHandle<()>, Sender<DecoderCmd>)>
where
    P: RbProducer<Item = f32> + Send + 'static,
{
    let (tx, rx) = channel();
    let handle = Decoder {
        path,
        producer,
        shared,
        stop,
        output_channels,
        output_sample_rate,
        cmd_rx: rx,
        post_seek_fade_samples: 0,
    }
    .spawn()?;
    Ok((handle, tx))
}
