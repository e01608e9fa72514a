//! Sample Buffer
use std::collections;
use std::sync;

pub type Sample = f32;

type _SampleBuf = sync::Arc<parking_lot::Mutex<collections::VecDeque<Sample>>>;

/// Mono ring buffer shared between a capture thread and the tick loop
///
/// The ring starts out filled with silence, so reading before enough samples arrived
/// yields a buffer that is zero-padded at the start.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    buf: _SampleBuf,
    rate: usize,
}

impl SampleBuffer {
    pub fn new(size: usize, rate: usize) -> SampleBuffer {
        let buf = collections::VecDeque::from(vec![0.0; size]);

        SampleBuffer {
            buf: sync::Arc::new(parking_lot::Mutex::new(buf)),
            rate,
        }
    }

    /// Append new samples, dropping the oldest ones
    pub fn push(&self, new: &[Sample]) {
        let mut lock = self.buf.lock();
        let size = lock.len();

        if new.len() >= size {
            lock.clear();
            lock.extend(new[new.len() - size..].iter().copied());
        } else {
            lock.drain(..new.len());
            lock.extend(new.iter().copied());
        }

        debug_assert_eq!(size, lock.len(), "Sample buffer size differs!");
    }

    /// Copy the most recent `out.len()` samples into `out`, oldest first
    ///
    /// If `out` is longer than the ring, the excess at the start is zeroed.
    pub fn copy_latest(&self, out: &mut [Sample]) {
        let lock = self.buf.lock();
        let len = lock.len();

        let (pad, take) = if out.len() > len {
            (out.len() - len, len)
        } else {
            (0, out.len())
        };

        for s in out[..pad].iter_mut() {
            *s = 0.0;
        }
        for (o, s) in out[pad..].iter_mut().zip(lock.iter().skip(len - take)) {
            *o = *s;
        }
    }

    /// Reset the ring to silence
    pub fn clear(&self) {
        let mut lock = self.buf.lock();
        for s in lock.iter_mut() {
            *s = 0.0;
        }
    }

    #[inline]
    pub fn rate(&self) -> usize {
        self.rate
    }

    pub fn capacity(&self) -> usize {
        self.buf.lock().len()
    }
}
