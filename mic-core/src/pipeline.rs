//! The tick loop
//!
//! Every call to [`Pipeline::tick`] reads the latest samples, windows and transforms them,
//! extracts features, advances the onset detector and publishes exactly one frame.
//!
//! The capture session follows the subscribers: the first consumer acquires the input, the
//! last one leaving releases it.  If acquisition fails, or the device goes away mid-session,
//! the pipeline is idle and publishes all-zero frames, retrying every `retry_interval` of
//! tick time.
use crate::analyzer;
use crate::bus::{Consumer, FeatureBus, SubscriptionHandle};
use crate::config::AnalyzerConfig;
use crate::error::{CaptureError, ConfigError, ConsumerFailure};
use crate::frame::FeatureFrame;
use crate::recorder::{Backend, SampleSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Handle for stopping a pipeline, also from inside one of its consumers
///
/// A shutdown requested during a tick takes effect once that tick has been published.
#[derive(Debug, Clone, Default)]
pub struct PipelineControl {
    shutdown: Arc<AtomicBool>,
}

impl PipelineControl {
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Outcome of one tick
#[derive(Debug, Clone)]
pub struct Tick {
    /// The frame as computed, before the bus applied its gain
    pub frame: FeatureFrame,
    pub failures: Vec<ConsumerFailure>,
    /// Set on the first tick after an acquisition failed or the device was lost
    pub capture_error: Option<CaptureError>,
}

#[derive(Debug)]
enum Session {
    /// Nobody is subscribed
    Inactive,
    Active(SampleSource),
    Idle {
        error: CaptureError,
        reported: bool,
        last_attempt: Option<Duration>,
    },
}

pub struct Pipeline {
    config: AnalyzerConfig,
    backend: Box<dyn Backend>,
    session: Session,

    windower: analyzer::Windower,
    windowed: Vec<analyzer::Sample>,
    spectral: analyzer::SpectralAnalyzer,
    extractor: analyzer::FeatureExtractor,
    detector: analyzer::OnsetDetector,
    bus: FeatureBus,

    frame: usize,
    control: PipelineControl,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("bus", &self.bus)
            .field("frame", &self.frame)
            .finish()
    }
}

impl Pipeline {
    /// Validate `config` and set up all stages
    ///
    /// Nothing is captured until the first consumer subscribes.
    pub fn new(config: AnalyzerConfig, backend: Box<dyn Backend>) -> Result<Pipeline, ConfigError> {
        let config = config.validate()?;

        log::debug!("Pipeline:");
        log::debug!("    Buffer Size         = {:8}", config.buffer_size);
        log::debug!("    Buckets             = {:8}", config.bucket_count);
        log::debug!("    Window              = {:>8}", config.window);
        log::debug!("    Gain                = {:8.3}", config.gain);
        log::debug!("    Retry Interval      = {:8?}", config.retry_interval);

        Ok(Pipeline {
            windower: analyzer::window::from_str(&config.window)
                .map(analyzer::Windower::new)
                .unwrap_or_default(),
            windowed: Vec::with_capacity(config.buffer_size),
            spectral: analyzer::SpectralAnalyzer::new(
                config.buffer_size,
                config.spectrum_smoothing,
            ),
            extractor: analyzer::FeatureExtractor::new(config.bucket_count),
            detector: analyzer::OnsetDetector::new(&config),
            bus: FeatureBus::new(config.gain),

            session: Session::Inactive,
            backend,
            frame: 0,
            control: PipelineControl::default(),
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn control(&self) -> PipelineControl {
        self.control.clone()
    }

    /// Whether a capture session is running
    pub fn is_active(&self) -> bool {
        matches!(self.session, Session::Active(_))
    }

    /// Whether consumers are subscribed but no input could be acquired
    pub fn is_idle(&self) -> bool {
        matches!(self.session, Session::Idle { .. })
    }

    pub fn is_shutdown(&self) -> bool {
        self.control.is_shutdown()
    }

    /// The error that put the pipeline into its idle state
    pub fn capture_error(&self) -> Option<&CaptureError> {
        match self.session {
            Session::Idle { ref error, .. } => Some(error),
            _ => None,
        }
    }

    /// Sample rate of the current session
    pub fn sample_rate(&self) -> Option<usize> {
        match self.session {
            Session::Active(ref src) => Some(src.sample_rate()),
            _ => None,
        }
    }

    /// Register the callback fired synchronously for every kick
    pub fn on_kick<F>(&mut self, f: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.detector.on_kick(f);
    }

    pub fn subscribe<C: Consumer + 'static>(&mut self, consumer: C) -> SubscriptionHandle {
        self.subscribe_boxed(Box::new(consumer))
    }

    /// Add a consumer, acquiring the input if it is the first one
    ///
    /// Acquisition may block on a permission prompt.  A failure does not reject the
    /// subscription, it is reported through [`Tick::capture_error`].
    pub fn subscribe_boxed(&mut self, consumer: Box<dyn Consumer>) -> SubscriptionHandle {
        let handle = self.bus.subscribe_boxed(consumer);

        if let Session::Inactive = self.session {
            if !self.is_shutdown() {
                self.session = self.start_session(None);
            }
        }

        handle
    }

    /// Remove a consumer, releasing the input once nobody is left
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let removed = self.bus.unsubscribe(handle);

        if removed && self.bus.is_empty() {
            self.end_session();
        }

        removed
    }

    /// Release the input and stop acquiring new ones
    pub fn shutdown(&mut self) {
        self.control.shutdown();
        self.end_session();
    }

    fn start_session(&mut self, now: Option<Duration>) -> Session {
        match SampleSource::acquire(&mut *self.backend, self.config.buffer_size) {
            Ok(src) => {
                self.detector.reset();
                self.spectral.reset();
                Session::Active(src)
            }
            Err(error) => {
                log::warn!("Audio input unavailable, publishing silence: {}", error);
                Session::Idle {
                    error,
                    reported: false,
                    last_attempt: now,
                }
            }
        }
    }

    fn end_session(&mut self) {
        if let Session::Active(ref mut src) = self.session {
            src.release();
        }
        self.session = Session::Inactive;
    }

    /// Drop a session whose device stopped delivering, so stale samples are not replayed
    fn check_alive(&mut self, now: Duration) {
        let dead = match self.session {
            Session::Active(ref src) => !src.is_alive(),
            _ => false,
        };

        if dead {
            log::warn!("Audio input lost, publishing silence");
            if let Session::Active(ref mut src) = self.session {
                src.release();
            }
            self.session = Session::Idle {
                error: CaptureError::DeviceUnavailable,
                reported: false,
                last_attempt: Some(now),
            };
        }
    }

    /// Retry a failed acquisition when due.  Returns the error if it was not reported yet.
    fn poll_idle(&mut self, now: Duration) -> Option<CaptureError> {
        let retry = self.config.retry_interval;

        let due = match self.session {
            Session::Idle {
                ref mut last_attempt,
                ..
            } => match *last_attempt {
                // The failed attempt happened at subscription, count it as now
                None => {
                    *last_attempt = Some(now);
                    false
                }
                Some(last) => now.saturating_sub(last) >= retry,
            },
            _ => return None,
        };

        if due && !self.is_shutdown() {
            log::debug!("Retrying audio input acquisition");

            let was_reported = match self.session {
                Session::Idle { reported, .. } => reported,
                _ => false,
            };
            self.session = self.start_session(Some(now));
            if let Session::Idle {
                ref mut reported, ..
            } = self.session
            {
                *reported = was_reported;
            }
        }

        match self.session {
            Session::Idle {
                ref error,
                ref mut reported,
                ..
            } if !*reported => {
                *reported = true;
                Some(error.clone())
            }
            _ => None,
        }
    }

    /// Produce and publish the frame for tick time `now`
    pub fn tick(&mut self, now: Duration) -> Tick {
        self.check_alive(now);
        let capture_error = self.poll_idle(now);

        let mut frame = match self.session {
            Session::Active(ref mut src) => {
                let samples = src.current_samples();

                self.windower.apply_into(samples, &mut self.windowed);
                let spectrum = self.spectral.analyze(&self.windowed);
                let features = self.extractor.extract(samples, spectrum);
                let onset = self.detector.detect(now, features.rms, &features.bands);

                FeatureFrame {
                    timestamp: now,
                    frame: 0,
                    rms: features.rms,
                    zcr: features.zcr,
                    bands: features.bands,
                    levels: features.levels,
                    kick_intensity: onset.kick_intensity,
                    kick_count: onset.kick_count,
                    kicked: onset.kicked,
                    cumulative: onset.cumulative,
                }
            }
            _ => FeatureFrame {
                timestamp: now,
                ..FeatureFrame::zeroed(self.config.bucket_count)
            },
        };

        frame.frame = self.frame;
        self.frame += 1;

        log::trace!(
            "Tick {} at {:?}: rms={:.3} kick={:.3} (#{})",
            frame.frame,
            now,
            frame.rms,
            frame.kick_intensity,
            frame.kick_count,
        );

        let failures = self.bus.publish(&frame);

        if self.is_shutdown() {
            self.end_session();
        }

        Tick {
            frame,
            failures,
            capture_error,
        }
    }
}
