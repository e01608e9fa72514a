//! Fixed-rate driving of a [`Pipeline`]
use crate::config::AnalyzerConfig;
use crate::pipeline::{Pipeline, Tick};
use std::time;

/// Source of tick time
pub trait Clock {
    /// Time since the clock started.  Never decreases.
    fn now(&mut self) -> time::Duration;

    /// Wait for `d`
    fn sleep(&mut self, d: time::Duration);
}

/// Wall clock for production use
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: time::Instant,
}

impl MonotonicClock {
    pub fn new() -> MonotonicClock {
        MonotonicClock {
            start: time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        MonotonicClock::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&mut self) -> time::Duration {
        self.start.elapsed()
    }

    fn sleep(&mut self, d: time::Duration) {
        std::thread::sleep(d);
    }
}

/// Clock that only moves when told to.  Sleeping advances it instantly.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: time::Duration,
}

impl ManualClock {
    pub fn new() -> ManualClock {
        Default::default()
    }

    pub fn advance(&mut self, d: time::Duration) {
        self.now += d;
    }
}

impl Clock for ManualClock {
    fn now(&mut self) -> time::Duration {
        self.now
    }

    fn sleep(&mut self, d: time::Duration) {
        self.advance(d);
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    period: time::Duration,
}

impl Scheduler {
    /// Tick `fps` times per second
    pub fn new(fps: u32) -> Scheduler {
        Scheduler::from_period(time::Duration::new(0, 1_000_000_000 / fps.max(1)))
    }

    pub fn from_period(period: time::Duration) -> Scheduler {
        log::debug!("Scheduler: tick period {:?}", period);
        Scheduler { period }
    }

    /// Tick at the `tick_rate` the cumulative counters are normalised to
    pub fn for_config(config: &AnalyzerConfig) -> Scheduler {
        Scheduler::from_period(time::Duration::from_secs_f32(1.0 / config.tick_rate))
    }

    #[inline]
    pub fn period(&self) -> time::Duration {
        self.period
    }

    /// Tick until shutdown is requested.  Returns the number of ticks.
    pub fn run<C: Clock>(&self, pipeline: &mut Pipeline, clock: &mut C) -> usize {
        self.run_with(pipeline, clock, None, |_| ())
    }

    /// Run at most `n` ticks, stopping early on shutdown
    pub fn run_ticks<C: Clock>(&self, pipeline: &mut Pipeline, clock: &mut C, n: usize) -> usize {
        self.run_with(pipeline, clock, Some(n), |_| ())
    }

    /// Like [`run_ticks`](Self::run_ticks), handing every [`Tick`] to `f`
    pub fn run_with<C, F>(
        &self,
        pipeline: &mut Pipeline,
        clock: &mut C,
        limit: Option<usize>,
        mut f: F,
    ) -> usize
    where
        C: Clock,
        F: FnMut(&Tick),
    {
        let mut count = 0;

        while limit.map_or(true, |n| count < n) && !pipeline.is_shutdown() {
            let start = clock.now();
            let tick = pipeline.tick(start);
            f(&tick);
            count += 1;

            let duration = clock.now().saturating_sub(start);
            log::trace!("Tick Time: {:?}", duration);

            if duration < self.period {
                clock.sleep(self.period - duration);
            }
        }

        log::debug!("Scheduler: stopped after {} ticks", count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FeatureFrame;
    use crate::recorder::{FeedBackend, Silence};
    use std::sync::{Arc, Mutex};

    fn pipeline() -> Pipeline {
        Pipeline::new(AnalyzerConfig::default(), Box::new(Silence { rate: 8000 })).unwrap()
    }

    #[test]
    fn test_fixed_cadence() {
        let mut pipeline = pipeline();
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let s = stamps.clone();
        pipeline.subscribe(move |f: &FeatureFrame| s.lock().unwrap().push(f.timestamp));

        let scheduler = Scheduler::from_period(time::Duration::from_millis(10));
        let mut clock = ManualClock::new();

        assert_eq!(scheduler.run_ticks(&mut pipeline, &mut clock, 5), 5);

        let expected: Vec<_> = (0..5).map(|i| time::Duration::from_millis(i * 10)).collect();
        assert_eq!(*stamps.lock().unwrap(), expected);
        assert_eq!(clock.now(), time::Duration::from_millis(50));
    }

    #[test]
    fn test_stops_on_shutdown() {
        let mut pipeline = pipeline();
        let control = pipeline.control();
        pipeline.subscribe(move |f: &FeatureFrame| {
            if f.frame == 3 {
                control.shutdown();
            }
        });

        let ticks = Scheduler::new(60).run(&mut pipeline, &mut ManualClock::new());

        assert_eq!(ticks, 4);
        assert!(!pipeline.is_active());
    }

    #[test]
    fn test_frame_counter() {
        let mut pipeline = pipeline();
        pipeline.subscribe(|_: &FeatureFrame| ());

        let mut frames = Vec::new();
        Scheduler::new(120).run_with(&mut pipeline, &mut ManualClock::new(), Some(3), |t| {
            frames.push(t.frame.frame)
        });

        assert_eq!(frames, vec![0, 1, 2]);
    }

    #[test]
    fn test_one_second_of_ticks() {
        let config = AnalyzerConfig {
            smoothing_alpha: 1.0,
            ..Default::default()
        };
        let scheduler = Scheduler::for_config(&config);
        let rate = config.tick_rate as usize;

        let (backend, handle) = FeedBackend::new(44100, 2048, 1);
        let mut pipeline = Pipeline::new(config, Box::new(backend)).unwrap();
        pipeline.subscribe(|_: &FeatureFrame| ());
        handle.push(&[0.5; 2048]);

        let mut clock = ManualClock::new();
        let mut all_rms = 0.0;
        scheduler.run_with(&mut pipeline, &mut clock, Some(rate), |t| {
            all_rms = t.frame.cumulative.all_rms
        });

        // A second of constant loudness adds exactly that loudness
        assert!((clock.now().as_secs_f32() - 1.0).abs() < 1e-3);
        assert!((all_rms - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_period() {
        assert_eq!(Scheduler::new(50).period(), time::Duration::from_millis(20));
        assert_eq!(Scheduler::new(0).period(), time::Duration::from_secs(1));

        let config = AnalyzerConfig {
            tick_rate: 50.0,
            ..Default::default()
        };
        let period = Scheduler::for_config(&config).period();
        assert!((period.as_secs_f32() - 0.02).abs() < 1e-6);
    }
}
