//! Kick detection
//!
//! Loudness is smoothed with an exponential moving average.  A kick triggers when the
//! smoothed value reaches the threshold and the last kick is long enough ago, after which
//! its intensity ramps linearly back to zero.
use crate::config::AnalyzerConfig;
use crate::frame::Cumulative;
use crate::helpers;
use std::time::Duration;

/// Band energies are scaled down by this much before entering the cumulative counters
pub const BAND_TREND_SCALE: f32 = 10.0;

/// Callback fired synchronously for every kick
pub type KickCallback = Box<dyn FnMut() + Send>;

/// Result of one detection step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Onset {
    pub smoothed: f32,
    pub kick_intensity: f32,
    pub kick_count: u64,
    pub kicked: bool,
    pub cumulative: Cumulative,
}

#[derive(Debug, Clone, Default)]
struct OnsetState {
    smoothed_rms: f32,
    // `None` until the first kick, which makes the first kick always eligible
    last_trigger: Option<Duration>,
    last_tick: Option<Duration>,
    kick_intensity: f32,
    trigger_count: u64,
    cumulative: Cumulative,
}

pub struct OnsetDetector {
    alpha: f32,
    threshold: f32,
    decay: Duration,
    lag: Duration,
    tick_rate: f32,

    state: OnsetState,
    on_kick: Option<KickCallback>,
}

impl std::fmt::Debug for OnsetDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("OnsetDetector")
            .field("alpha", &self.alpha)
            .field("threshold", &self.threshold)
            .field("decay", &self.decay)
            .field("lag", &self.lag)
            .field("tick_rate", &self.tick_rate)
            .field("state", &self.state)
            .field("on_kick", &self.on_kick.is_some())
            .finish()
    }
}

impl OnsetDetector {
    pub fn new(config: &AnalyzerConfig) -> OnsetDetector {
        let od = OnsetDetector {
            alpha: config.smoothing_alpha,
            threshold: config.kick_threshold,
            decay: config.kick_decay,
            lag: config.kick_lag,
            tick_rate: config.tick_rate,

            state: OnsetState::default(),
            on_kick: None,
        };

        log::debug!("OnsetDetector({:p}):", &od);
        log::debug!("    Smoothing           = {:8.3}", od.alpha);
        log::debug!("    Threshold           = {:8.3}", od.threshold);
        log::debug!("    Decay               = {:8?}", od.decay);
        log::debug!("    Lag                 = {:8?}", od.lag);
        log::debug!("    Tick Rate           = {:8.1} Hz", od.tick_rate);

        od
    }

    /// Register the callback fired for every kick, replacing any previous one
    pub fn on_kick<F>(&mut self, f: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_kick = Some(Box::new(f));
    }

    pub fn clear_on_kick(&mut self) {
        self.on_kick = None;
    }

    /// Start over with fresh state.  The callback is kept.
    pub fn reset(&mut self) {
        self.state = OnsetState::default();
    }

    #[inline]
    pub fn smoothed(&self) -> f32 {
        self.state.smoothed_rms
    }

    #[inline]
    pub fn kick_intensity(&self) -> f32 {
        self.state.kick_intensity
    }

    #[inline]
    pub fn kick_count(&self) -> u64 {
        self.state.trigger_count
    }

    #[inline]
    pub fn last_trigger(&self) -> Option<Duration> {
        self.state.last_trigger
    }

    #[inline]
    pub fn cumulative(&self) -> Cumulative {
        self.state.cumulative
    }

    /// Advance the detector to `now` with this tick's raw loudness and bands
    ///
    /// A silent tick (`rms == 0`) never triggers, whatever the smoothed history says.
    pub fn detect(&mut self, now: Duration, rms: f32, bands: &[f32]) -> Onset {
        let rms = helpers::finite_or_zero(rms).max(0.0);
        let st = &mut self.state;

        st.smoothed_rms = st.smoothed_rms * (1.0 - self.alpha) + rms * self.alpha;

        let elapsed = match st.last_tick {
            Some(prev) => now.saturating_sub(prev),
            None => Duration::ZERO,
        };
        st.last_tick = Some(st.last_tick.map_or(now, |prev| prev.max(now)));

        // A zero lag holds the intensity until the next kick
        if st.kick_intensity > 0.0 && !self.lag.is_zero() {
            st.kick_intensity = (st.kick_intensity
                - helpers::millis(elapsed) / helpers::millis(self.lag))
            .max(0.0);
        }

        let eligible = match st.last_trigger {
            None => true,
            Some(last) => now.checked_sub(last).map_or(false, |d| d > self.decay),
        };

        let kicked = rms > 0.0 && st.smoothed_rms >= self.threshold && eligible;
        if kicked {
            st.kick_intensity = 1.0;
            st.trigger_count += 1;
            st.last_trigger = Some(now);
            log::trace!(
                "Kick #{} at {:?} (smoothed {:.3})",
                st.trigger_count,
                now,
                st.smoothed_rms
            );
        }

        let low = bands.first().copied().unwrap_or(0.0);
        let mid = bands.get(bands.len() / 2).copied().unwrap_or(0.0);
        let high = bands.last().copied().unwrap_or(0.0);
        let band_norm = BAND_TREND_SCALE * self.tick_rate;

        st.cumulative.all_rms += st.smoothed_rms / self.tick_rate;
        st.cumulative.all_low += low / band_norm;
        st.cumulative.all_mid += mid / band_norm;
        st.cumulative.all_high += high / band_norm;

        let onset = Onset {
            smoothed: st.smoothed_rms,
            kick_intensity: st.kick_intensity,
            kick_count: st.trigger_count,
            kicked,
            cumulative: st.cumulative,
        };

        if kicked {
            if let Some(ref mut cb) = self.on_kick {
                cb();
            }
        }

        onset
    }
}
