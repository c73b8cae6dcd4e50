// src/decoder/dsp.rs

/// Appends interleaved frames to per-channel staging vectors.
pub fn append_interleaved_to_planar(interleaved: &[f32], planar: &mut [Vec<f32>]) {
    let channels = planar.len();
    if channels == 0 {
        return;
    }
    for frame in interleaved.chunks_exact(channels) {
        for (lane, &s) in planar.iter_mut().zip(frame) {
            lane.push(s);
        }
    }
}

/// Frames available in every channel.
pub fn planar_len(planar: &[Vec<f32>]) -> usize {
    planar.iter().map(Vec::len).min().unwrap_or(0)
}

/// Removes the first `frames` frames from every channel and returns them.
pub fn take_from_planar(planar: &mut [Vec<f32>], frames: usize) -> Vec<Vec<f32>> {
    planar
        .iter_mut()
        .map(|lane| {
            let n = frames.min(lane.len());
            lane.drain(..n).collect()
        })
        .collect()
}

pub fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar_len(planar);
    let mut out = Vec::with_capacity(frames * planar.len());
    for f in 0..frames {
        out.extend(planar.iter().map(|lane| lane[f]));
    }
    out
}

/// Maps `in_ch` interleaved channels onto `out_ch`: mono is duplicated,
/// stereo to mono is averaged, wider layouts are averaged in groups or wrapped.
pub fn updown_mix_interleaved(input: &[f32], in_ch: usize, out_ch: usize) -> Vec<f32> {
    if in_ch == out_ch || in_ch == 0 || out_ch == 0 {
        return input.to_vec();
    }
    let mut out = Vec::with_capacity(input.len() / in_ch * out_ch);

    for frame in input.chunks_exact(in_ch) {
        if out_ch < in_ch {
            let group = in_ch as f32 / out_ch as f32;
            for oc in 0..out_ch {
                let start = (oc as f32 * group).floor() as usize;
                let end = (((oc + 1) as f32 * group).ceil() as usize).min(in_ch);
                let lanes = &frame[start..end];
                out.push(lanes.iter().sum::<f32>() / lanes.len().max(1) as f32);
            }
        } else {
            out.extend((0..out_ch).map(|oc| frame[oc % in_ch]));
        }
    }

    out
}

#[inline]
pub fn fade_samples_ms(sample_rate: u32, ms: u32) -> usize {
    ((sample_rate as u64 * ms as u64) / 1000) as usize
}
