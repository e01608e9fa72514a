//! Recorders that do not talk to an audio device themselves
use super::resample::Resampler;
use super::{Backend, Recorder};
use crate::analyzer;
use crate::error::CaptureError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Recorder whose samples are pushed in by the host through a [`FeedHandle`]
#[derive(Debug)]
pub struct FeedRecorder {
    buffer: analyzer::SampleBuffer,
    connected: Arc<AtomicBool>,
}

impl FeedRecorder {
    fn new(buffer: analyzer::SampleBuffer, connected: Arc<AtomicBool>) -> FeedRecorder {
        FeedRecorder { buffer, connected }
    }
}

impl Recorder for FeedRecorder {
    fn sample_buffer(&self) -> &analyzer::SampleBuffer {
        &self.buffer
    }

    fn is_alive(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Pushes host-captured audio into a [`FeedRecorder`]
#[derive(Debug, Clone)]
pub struct FeedHandle {
    buffer: analyzer::SampleBuffer,
    channels: usize,
    connected: Arc<AtomicBool>,
}

impl FeedHandle {
    /// Push interleaved samples with the channel count given to [`FeedBackend::new`]
    ///
    /// Multi-channel input is averaged down to mono.
    pub fn push(&self, interleaved: &[f32]) {
        if self.channels <= 1 {
            self.buffer.push(interleaved);
            return;
        }

        let mono: Vec<f32> = interleaved
            .chunks(self.channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        self.buffer.push(&mono);
    }

    /// Resample from `rate` to the feed's rate, then push
    pub fn push_resampled(&self, resampler: &mut Resampler, interleaved: &[f32]) {
        let mut out = Vec::with_capacity(interleaved.len());
        resampler.process(interleaved, &mut out);
        self.push(&out);
    }

    pub fn rate(&self) -> usize {
        self.buffer.rate()
    }

    /// Signal that the host's input is gone.  The current session stops producing audio.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Backend handing out [`FeedRecorder`]s that share one ring
///
/// The host keeps one [`FeedHandle`] across sessions.  Every acquisition resets the ring to
/// silence and reconnects the feed.
#[derive(Debug, Clone)]
pub struct FeedBackend {
    buffer: analyzer::SampleBuffer,
    connected: Arc<AtomicBool>,
}

impl FeedBackend {
    pub fn new(rate: usize, capacity: usize, channels: usize) -> (FeedBackend, FeedHandle) {
        let buffer = analyzer::SampleBuffer::new(capacity, rate);
        let connected = Arc::new(AtomicBool::new(true));

        log::debug!("FeedBackend:");
        log::debug!("    Sample Rate = {:6}", rate);
        log::debug!("    Capacity    = {:6}", capacity);
        log::debug!("    Channels    = {:6}", channels);

        (
            FeedBackend {
                buffer: buffer.clone(),
                connected: connected.clone(),
            },
            FeedHandle {
                buffer,
                channels: channels.max(1),
                connected,
            },
        )
    }
}

impl Backend for FeedBackend {
    fn open(&mut self, _buffer_size: usize) -> Result<Box<dyn Recorder>, CaptureError> {
        self.buffer.clear();
        self.connected.store(true, Ordering::SeqCst);

        Ok(Box::new(FeedRecorder::new(
            self.buffer.clone(),
            self.connected.clone(),
        )))
    }
}

/// Backend for a machine without audio input: every acquisition fails
#[derive(Debug, Clone)]
pub struct Unavailable(pub CaptureError);

impl Default for Unavailable {
    fn default() -> Self {
        Unavailable(CaptureError::DeviceUnavailable)
    }
}

impl Backend for Unavailable {
    fn open(&mut self, _buffer_size: usize) -> Result<Box<dyn Recorder>, CaptureError> {
        Err(self.0.clone())
    }
}

/// Backend producing silence forever
#[derive(Debug, Clone, Default)]
pub struct Silence {
    pub rate: usize,
}

impl Backend for Silence {
    fn open(&mut self, buffer_size: usize) -> Result<Box<dyn Recorder>, CaptureError> {
        Ok(Box::new(FeedRecorder::new(
            analyzer::SampleBuffer::new(buffer_size, self.rate),
            Arc::new(AtomicBool::new(true)),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_downmix() {
        let (mut backend, handle) = FeedBackend::new(8000, 4, 2);
        let recorder = backend.open(4).unwrap();

        handle.push(&[1.0, 0.0, 0.5, 0.5, -1.0, -0.5]);

        let mut out = [9.0; 4];
        recorder.sample_buffer().copy_latest(&mut out);
        assert_eq!(out, [0.0, 0.5, 0.5, -0.75]);
    }

    #[test]
    fn test_feed_resampled() {
        let (_, handle) = FeedBackend::new(16000, 8, 1);
        let mut resampler = Resampler::new(8000, 16000);

        handle.push_resampled(&mut resampler, &[1.0, 1.0, 1.0, 1.0]);

        let mut out = [0.0; 8];
        handle.buffer.copy_latest(&mut out);
        assert_eq!(out, [0.0, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_reopen_starts_silent() {
        let (mut backend, handle) = FeedBackend::new(8000, 4, 1);

        let first = backend.open(4).unwrap();
        handle.push(&[0.5; 4]);
        drop(first);

        handle.disconnect();
        let second = backend.open(4).unwrap();

        let mut out = [9.0; 4];
        second.sample_buffer().copy_latest(&mut out);
        assert_eq!(out, [0.0; 4]);
        assert!(second.is_alive());
        assert!(handle.is_connected());
    }

    #[test]
    fn test_unavailable() {
        let mut backend = Unavailable::default();
        assert_eq!(
            backend.open(2048).unwrap_err(),
            CaptureError::DeviceUnavailable
        );

        let mut denied = Unavailable(CaptureError::PermissionDenied);
        assert_eq!(denied.open(2048).unwrap_err(), CaptureError::PermissionDenied);
    }
}
