//! Audio capture
//!
//! A [`Backend`] opens [`Recorder`]s, a recorder fills a [`SampleBuffer`] from some audio
//! source, and a [`SampleSource`] owns one recorder for the length of a capture session.
//!
//! [`SampleBuffer`]: crate::analyzer::SampleBuffer
#[cfg(feature = "cpalrecord")]
pub mod cpal;

pub mod feed;
pub mod resample;

use crate::analyzer;
use crate::error::CaptureError;

pub use self::feed::{FeedBackend, FeedHandle, Silence, Unavailable};
pub use self::resample::Resampler;

pub trait Recorder: std::fmt::Debug + Send {
    /// Return the sample buffer where this recorder pushes data into
    fn sample_buffer(&self) -> &analyzer::SampleBuffer;

    /// Whether samples are still arriving.  `false` once the device is gone.
    fn is_alive(&self) -> bool {
        true
    }

    /// Stop capturing.  Must be safe to call more than once.
    fn release(&mut self) {}
}

/// Something that can open a recorder, possibly prompting the user for permission
pub trait Backend: Send {
    fn open(&mut self, buffer_size: usize) -> Result<Box<dyn Recorder>, CaptureError>;
}

impl<F> Backend for F
where
    F: FnMut(usize) -> Result<Box<dyn Recorder>, CaptureError> + Send,
{
    fn open(&mut self, buffer_size: usize) -> Result<Box<dyn Recorder>, CaptureError> {
        self(buffer_size)
    }
}

/// Config driven backend selection
///
/// Recognised recorders are `"cpal"` (when the `cpalrecord` feature is enabled),
/// `"silence"` and `"none"`.
#[derive(Debug, Clone, Default)]
pub struct RecorderBuilder {
    pub rate: Option<usize>,
    pub recorder: Option<String>,
}

impl RecorderBuilder {
    pub fn new() -> RecorderBuilder {
        Default::default()
    }

    /// Resample captured audio to this rate instead of using the device rate
    pub fn rate(&mut self, rate: usize) -> &mut RecorderBuilder {
        self.rate = Some(rate);
        self
    }

    pub fn recorder<S: Into<String>>(&mut self, rec: S) -> &mut RecorderBuilder {
        self.recorder = Some(rec.into());
        self
    }

    fn resolve(&self) -> (Option<usize>, String) {
        // 0 stands for the device rate
        let rate = self
            .rate
            .or_else(|| match crate::CONFIG.get_or("audio.rate", 0usize) {
                0 => None,
                r => Some(r),
            });
        let recorder = self
            .recorder
            .clone()
            .unwrap_or_else(|| crate::CONFIG.get_or("audio.recorder", "cpal".to_string()));

        (rate, recorder)
    }
}

impl Backend for RecorderBuilder {
    fn open(&mut self, buffer_size: usize) -> Result<Box<dyn Recorder>, CaptureError> {
        let (rate, recorder) = self.resolve();

        match &*recorder {
            #[cfg(feature = "cpalrecord")]
            "cpal" => self::cpal::CPalBuilder {
                rate,
                buffer_size: Some(buffer_size),
            }
            .build(),

            "silence" => Silence {
                rate: rate.unwrap_or(44100),
            }
            .open(buffer_size),

            "none" => Unavailable::default().open(buffer_size),

            other => Err(CaptureError::Stream(format!(
                "Recorder type {:?} does not exist",
                other
            ))),
        }
    }
}

/// Live mono input for one capture session
///
/// Hands out the most recent `buffer_size` samples on every tick.  Once released, it only
/// produces silence.
#[derive(Debug)]
pub struct SampleSource {
    recorder: Option<Box<dyn Recorder>>,
    rate: usize,
    current: Vec<analyzer::Sample>,
}

impl SampleSource {
    /// Open an input through `backend`
    ///
    /// This may block for a while, e.g. on a permission prompt.
    pub fn acquire(
        backend: &mut dyn Backend,
        buffer_size: usize,
    ) -> Result<SampleSource, CaptureError> {
        let recorder = backend.open(buffer_size)?;
        Ok(SampleSource::from_recorder(recorder, buffer_size))
    }

    pub fn from_recorder(recorder: Box<dyn Recorder>, buffer_size: usize) -> SampleSource {
        let rate = recorder.sample_buffer().rate();

        log::info!(
            "Capture session started ({} Hz, {} samples per window)",
            rate,
            buffer_size
        );

        SampleSource {
            recorder: Some(recorder),
            rate,
            current: vec![0.0; buffer_size],
        }
    }

    /// The latest window of samples, oldest first
    ///
    /// Never blocks.  The returned buffer is overwritten by the next call.
    pub fn current_samples(&mut self) -> &[analyzer::Sample] {
        match self.recorder {
            Some(ref rec) => rec.sample_buffer().copy_latest(&mut self.current),
            None => {
                for s in self.current.iter_mut() {
                    *s = 0.0;
                }
            }
        }

        &self.current
    }

    /// Sample rate of the buffers returned by [`current_samples`](Self::current_samples)
    #[inline]
    pub fn sample_rate(&self) -> usize {
        self.rate
    }

    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.current.len()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.recorder.is_some()
    }

    /// Whether the device is still delivering.  A released source is never alive.
    pub fn is_alive(&self) -> bool {
        self.recorder.as_ref().map_or(false, |rec| rec.is_alive())
    }

    /// Disconnect from the device.  Idempotent.
    pub fn release(&mut self) {
        if let Some(mut rec) = self.recorder.take() {
            rec.release();
            log::info!("Capture session released");
        }
    }
}

impl Drop for SampleSource {
    fn drop(&mut self) {
        self.release();
    }
}
