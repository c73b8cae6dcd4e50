// src/decoder/output.rs

use ringbuf::traits::Producer as RbProducer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Pushes `data` into the ring buffer, fading in the first
/// `post_seek_fade_samples` samples. Waits for room while the buffer is full.
///
/// Returns `false` if `stop` was raised while waiting; the rest of `data` is
/// dropped in that case.
pub fn push_with_fade<P: RbProducer<Item = f32>>(
    producer: &mut P,
    data: &[f32],
    post_seek_fade_samples: &mut usize,
    stop: &AtomicBool,
) -> bool {
    let fade = (*post_seek_fade_samples).min(data.len());

    for (i, &sample) in data.iter().enumerate() {
        let s = if i < fade {
            sample * (i as f32 / fade as f32)
        } else {
            sample
        };
        while producer.try_push(s).is_err() {
            if stop.load(Ordering::Relaxed) {
                return false;
            }
            std::thread::park_timeout(Duration::from_micros(200));
        }
    }

    *post_seek_fade_samples -= fade;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Consumer, Split};
    use ringbuf::HeapRb;

    #[test]
    fn test_fade_ramps_first_samples() {
        let (mut prod, mut cons) = HeapRb::<f32>::new(16).split();
        let stop = AtomicBool::new(false);
        let mut fade = 4;
        assert!(push_with_fade(&mut prod, &[1.0; 6], &mut fade, &stop));
        assert_eq!(fade, 0);
        let out: Vec<f32> = std::iter::from_fn(|| cons.try_pop()).collect();
        assert_eq!(out, vec![0.0, 0.25, 0.5, 0.75, 1.0, 1.0]);
    }

    #[test]
    fn test_full_buffer_gives_up_when_stopped() {
        let (mut prod, _cons) = HeapRb::<f32>::new(2).split();
        let stop = AtomicBool::new(true);
        let mut fade = 0;
        assert!(!push_with_fade(&mut prod, &[0.5; 4], &mut fade, &stop));
    }
}
