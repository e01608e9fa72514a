//! Analyzer configuration
use crate::error::ConfigError;
use std::time::Duration;

/// Smallest accepted analysis window
pub const MIN_BUFFER_SIZE: usize = 2048;

/// Settings shared by every stage of the pipeline
///
/// Once handed to a [`Pipeline`](crate::pipeline::Pipeline) the config is fixed for its
/// lifetime.  Use [`AnalyzerBuilder`] to fill unset values from [`CONFIG`](crate::CONFIG).
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Number of samples per analysis window.  Power of two, raised to at least
    /// [`MIN_BUFFER_SIZE`].
    pub buffer_size: usize,

    /// Number of spectral bands in every frame
    pub bucket_count: usize,

    /// EMA factor for the loudness smoother.  `1.0` tracks the raw value, `0.0` never moves.
    pub smoothing_alpha: f32,

    /// Smoothed loudness at which a kick may trigger
    pub kick_threshold: f32,

    /// Minimum time between two kicks
    pub kick_decay: Duration,

    /// Time for a kick's intensity to ramp from 1 down to 0.  Zero holds it at 1 until the
    /// next kick.
    pub kick_lag: Duration,

    /// Tick rate in Hz.  Normalises the cumulative counters and sets the period of
    /// [`Scheduler::for_config`](crate::scheduler::Scheduler::for_config).
    pub tick_rate: f32,

    /// Name of the window function applied before the transform, see
    /// [`window::from_str`](crate::analyzer::window::from_str)
    pub window: String,

    /// Per-bin smoothing of spectrum magnitudes over time.  `0.0` disables it.
    pub spectrum_smoothing: f32,

    /// Gain applied to `rms` in frames handed to consumers
    pub gain: f32,

    /// How often an idle pipeline tries to reacquire its audio input
    pub retry_interval: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            buffer_size: MIN_BUFFER_SIZE,
            bucket_count: 7,
            smoothing_alpha: 0.5,
            kick_threshold: 0.5,
            kick_decay: Duration::from_millis(200),
            kick_lag: Duration::from_millis(150),
            tick_rate: 60.0,
            window: "hanning".to_string(),
            spectrum_smoothing: 0.0,
            gain: 1.0,
            retry_interval: Duration::from_secs(2),
        }
    }
}

impl AnalyzerConfig {
    /// Check ranges and normalise the buffer size
    ///
    /// Buffer sizes below [`MIN_BUFFER_SIZE`] are raised to it, anything else must
    /// already be a power of two.
    pub fn validate(mut self) -> Result<AnalyzerConfig, ConfigError> {
        if self.buffer_size < MIN_BUFFER_SIZE {
            log::debug!(
                "Raising buffer size {} to the minimum of {}",
                self.buffer_size,
                MIN_BUFFER_SIZE
            );
            self.buffer_size = MIN_BUFFER_SIZE;
        }
        if !self.buffer_size.is_power_of_two() {
            return Err(ConfigError::BufferNotPowerOfTwo(self.buffer_size));
        }

        if self.bucket_count == 0 {
            return Err(ConfigError::NoBuckets);
        }
        if self.bucket_count > self.spectrum_len() {
            return Err(ConfigError::TooManyBuckets {
                buckets: self.bucket_count,
                bins: self.spectrum_len(),
            });
        }

        if crate::analyzer::window::from_str(&self.window).is_none() {
            return Err(ConfigError::UnknownWindow(self.window));
        }

        unit_range("smoothing_alpha", self.smoothing_alpha)?;
        unit_range("spectrum_smoothing", self.spectrum_smoothing)?;
        positive("tick_rate", self.tick_rate)?;

        if !self.kick_threshold.is_finite() {
            return Err(ConfigError::NotPositive {
                name: "kick_threshold",
                value: self.kick_threshold,
            });
        }
        if !self.gain.is_finite() || self.gain < 0.0 {
            return Err(ConfigError::NotPositive {
                name: "gain",
                value: self.gain,
            });
        }

        Ok(self)
    }

    /// Number of bins in the spectrum computed from one window
    #[inline]
    pub fn spectrum_len(&self) -> usize {
        self.buffer_size / 2
    }
}

fn unit_range(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { name, value })
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

/// Builder for [`AnalyzerConfig`]
///
/// Every value that is not set explicitly is read from the global config, falling back to
/// [`AnalyzerConfig::default`].
#[derive(Debug, Default, Clone)]
pub struct AnalyzerBuilder {
    /// Can also be set from config as `"audio.buffer_size"`.
    pub buffer_size: Option<usize>,

    /// Can also be set from config as `"analyzer.buckets"`.
    pub bucket_count: Option<usize>,

    /// Can also be set from config as `"onset.smoothing"`.
    pub smoothing_alpha: Option<f32>,

    /// Can also be set from config as `"onset.threshold"`.
    pub kick_threshold: Option<f32>,

    /// Can also be set from config as `"onset.decay_ms"`.
    pub kick_decay_ms: Option<u64>,

    /// Can also be set from config as `"onset.lag_ms"`.
    pub kick_lag_ms: Option<u64>,

    /// Can also be set from config as `"onset.tick_rate"`.
    pub tick_rate: Option<f32>,

    /// Can also be set from config as `"analyzer.window"`.
    pub window: Option<String>,

    /// Can also be set from config as `"analyzer.spectrum_smoothing"`.
    pub spectrum_smoothing: Option<f32>,

    /// Can also be set from config as `"analyzer.gain"`.
    pub gain: Option<f32>,

    /// Can also be set from config as `"audio.retry_ms"`.
    pub retry_ms: Option<u64>,
}

impl AnalyzerBuilder {
    pub fn new() -> AnalyzerBuilder {
        Default::default()
    }

    pub fn buffer_size(&mut self, size: usize) -> &mut AnalyzerBuilder {
        self.buffer_size = Some(size);
        self
    }

    pub fn buckets(&mut self, count: usize) -> &mut AnalyzerBuilder {
        self.bucket_count = Some(count);
        self
    }

    pub fn smoothing(&mut self, alpha: f32) -> &mut AnalyzerBuilder {
        self.smoothing_alpha = Some(alpha);
        self
    }

    pub fn threshold(&mut self, threshold: f32) -> &mut AnalyzerBuilder {
        self.kick_threshold = Some(threshold);
        self
    }

    pub fn decay_ms(&mut self, ms: u64) -> &mut AnalyzerBuilder {
        self.kick_decay_ms = Some(ms);
        self
    }

    pub fn lag_ms(&mut self, ms: u64) -> &mut AnalyzerBuilder {
        self.kick_lag_ms = Some(ms);
        self
    }

    pub fn tick_rate(&mut self, hz: f32) -> &mut AnalyzerBuilder {
        self.tick_rate = Some(hz);
        self
    }

    pub fn window<S: Into<String>>(&mut self, name: S) -> &mut AnalyzerBuilder {
        self.window = Some(name.into());
        self
    }

    pub fn spectrum_smoothing(&mut self, factor: f32) -> &mut AnalyzerBuilder {
        self.spectrum_smoothing = Some(factor);
        self
    }

    pub fn gain(&mut self, gain: f32) -> &mut AnalyzerBuilder {
        self.gain = Some(gain);
        self
    }

    /// How long an idle pipeline waits between acquisition attempts
    pub fn retry_ms(&mut self, ms: u64) -> &mut AnalyzerBuilder {
        self.retry_ms = Some(ms);
        self
    }

    /// Resolve all values and validate the result
    pub fn build(&self) -> Result<AnalyzerConfig, ConfigError> {
        let d = AnalyzerConfig::default();

        AnalyzerConfig {
            buffer_size: self
                .buffer_size
                .unwrap_or_else(|| crate::CONFIG.get_or("audio.buffer_size", d.buffer_size)),
            bucket_count: self
                .bucket_count
                .unwrap_or_else(|| crate::CONFIG.get_or("analyzer.buckets", d.bucket_count)),
            smoothing_alpha: self
                .smoothing_alpha
                .unwrap_or_else(|| crate::CONFIG.get_or("onset.smoothing", d.smoothing_alpha)),
            kick_threshold: self
                .kick_threshold
                .unwrap_or_else(|| crate::CONFIG.get_or("onset.threshold", d.kick_threshold)),
            kick_decay: std::time::Duration::from_millis(self.kick_decay_ms.unwrap_or_else(
                || crate::CONFIG.get_or("onset.decay_ms", d.kick_decay.as_millis() as u64),
            )),
            kick_lag: std::time::Duration::from_millis(self.kick_lag_ms.unwrap_or_else(|| {
                crate::CONFIG.get_or("onset.lag_ms", d.kick_lag.as_millis() as u64)
            })),
            tick_rate: self
                .tick_rate
                .unwrap_or_else(|| crate::CONFIG.get_or("onset.tick_rate", d.tick_rate)),
            window: self
                .window
                .clone()
                .unwrap_or_else(|| crate::CONFIG.get_or("analyzer.window", d.window.clone())),
            spectrum_smoothing: self.spectrum_smoothing.unwrap_or_else(|| {
                crate::CONFIG.get_or("analyzer.spectrum_smoothing", d.spectrum_smoothing)
            }),
            gain: self
                .gain
                .unwrap_or_else(|| crate::CONFIG.get_or("analyzer.gain", d.gain)),
            retry_interval: std::time::Duration::from_millis(self.retry_ms.unwrap_or_else(|| {
                crate::CONFIG.get_or("audio.retry_ms", d.retry_interval.as_millis() as u64)
            })),
        }
        .validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = AnalyzerConfig::default().validate().unwrap();
        assert_eq!(config.buffer_size, 2048);
        assert_eq!(config.bucket_count, 7);
        assert_eq!(config.spectrum_len(), 1024);
        assert_eq!(config.tick_rate, 60.0);
    }

    #[test]
    fn test_buffer_floor() {
        let config = AnalyzerConfig {
            buffer_size: 512,
            ..Default::default()
        }
        .validate()
        .unwrap();

        assert_eq!(config.buffer_size, MIN_BUFFER_SIZE);
    }

    #[test]
    fn test_power_of_two() {
        let err = AnalyzerConfig {
            buffer_size: 3000,
            ..Default::default()
        }
        .validate()
        .unwrap_err();

        assert_eq!(err, ConfigError::BufferNotPowerOfTwo(3000));
    }

    #[test]
    fn test_ranges() {
        let bad_alpha = AnalyzerConfig {
            smoothing_alpha: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            bad_alpha.validate(),
            Err(ConfigError::OutOfUnitRange { name: "smoothing_alpha", .. })
        ));

        let no_buckets = AnalyzerConfig {
            bucket_count: 0,
            ..Default::default()
        };
        assert_eq!(no_buckets.validate(), Err(ConfigError::NoBuckets));

        let zero_rate = AnalyzerConfig {
            tick_rate: 0.0,
            ..Default::default()
        };
        assert!(zero_rate.validate().is_err());
    }

    #[test]
    fn test_builder_explicit() {
        let config = AnalyzerBuilder::new()
            .buffer_size(4096)
            .buckets(12)
            .smoothing(0.25)
            .threshold(0.4)
            .decay_ms(250)
            .lag_ms(100)
            .tick_rate(60.0)
            .window("none")
            .spectrum_smoothing(0.0)
            .gain(2.0)
            .retry_ms(500)
            .build()
            .unwrap();

        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.bucket_count, 12);
        assert_eq!(config.kick_decay, Duration::from_millis(250));
        assert_eq!(config.kick_lag, Duration::from_millis(100));
        assert_eq!(config.gain, 2.0);
        assert_eq!(config.window, "none");
        assert_eq!(config.retry_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_unknown_window() {
        let err = AnalyzerConfig {
            window: "kaiser".to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap_err();

        assert_eq!(err, ConfigError::UnknownWindow("kaiser".to_string()));
    }
}
