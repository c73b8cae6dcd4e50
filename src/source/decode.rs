// src/source/decode.rs

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::default::{get_codecs, get_probe};

use super::DecodedAudio;
use crate::error::{PlayerError, Result};

/// Decodes a whole in-memory file into planar f32 channels.
///
/// The format reader and codec live only for the duration of this call.
pub fn decode_to_planar(bytes: Vec<u8>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = get_probe().format(
        &Default::default(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| PlayerError::Decode("no audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut sample_rate = codec_params.sample_rate.unwrap_or(44_100);
    let mut channel_count = codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let mut decoder = get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut planar: Vec<Vec<f32>> = vec![Vec::new(); channel_count];
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut first_packet = true;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) if !first_packet => {
                log::warn!("⚠️ stopping decode early: {e}");
                break;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                log::debug!("skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if first_packet {
            if decoded.frames() == 0 {
                continue;
            }
            sample_rate = spec.rate;
            channel_count = spec.channels.count();
            planar = vec![Vec::new(); channel_count];
            first_packet = false;
        }

        let needs_alloc = sample_buf
            .as_ref()
            .is_none_or(|buf| buf.capacity() < decoded.capacity());
        if needs_alloc {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        let current_channels = spec.channels.count();
        if current_channels != channel_count || current_channels == 0 {
            // Channel layout changed mid-stream; keep what is usable.
            continue;
        }
        for frame in buf.samples().chunks(current_channels) {
            for (ch, &s) in frame.iter().enumerate() {
                planar[ch].push(s);
            }
        }
    }

    if first_packet {
        return Err(PlayerError::Decode("stream contains no audio frames".into()));
    }

    let frames = planar.first().map(Vec::len).unwrap_or(0);
    let duration = frames as f64 / sample_rate as f64;

    Ok(DecodedAudio {
        channels: planar,
        sample_rate,
        duration,
    })
}
