//! Live audio feature extraction for audio-reactive visuals.
//!
//! Every tick the latest window of microphone samples is turned into a [`FeatureFrame`]:
//! loudness, zero-crossing rate, normalised spectral bands and a debounced kick detector
//! with decaying intensity.  Frames are handed to any number of subscribed consumers.
//!
//! # Example
//! ```rust
//! use mic_core::{AnalyzerConfig, FeatureFrame, Pipeline};
//! use mic_core::recorder::FeedBackend;
//! use std::time::Duration;
//!
//! // Samples come from the host here.  Use `RecorderBuilder` for a real microphone.
//! let (backend, feed) = FeedBackend::new(44100, 4096, 1);
//!
//! let mut pipeline = Pipeline::new(AnalyzerConfig::default(), Box::new(backend))
//!     .expect("invalid config");
//!
//! pipeline.on_kick(|| println!("Kick!"));
//!
//! // The first subscriber starts the capture session
//! pipeline.subscribe(|frame: &FeatureFrame| {
//!     for _ in 0..(frame.rms * 50.0) as usize {
//!         print!("#");
//!     }
//!     println!("");
//! });
//!
//! for i in 0..10u64 {
//!     feed.push(&[0.8; 512]);
//!     let tick = pipeline.tick(Duration::from_millis(i * 16));
//!     assert_eq!(tick.frame.bands.len(), 7);
//! #   assert!(tick.failures.is_empty());
//! }
//! ```
//!
//! For a fixed frame rate, let a [`Scheduler`] drive the pipeline.
pub mod analyzer;
pub mod bus;
pub mod config;
pub mod error;
pub mod frame;
pub mod helpers;
pub mod pipeline;
pub mod recorder;
pub mod scheduler;
pub mod shared;

#[doc(inline)]
pub use crate::bus::{Consumer, FeatureBus, SubscriptionHandle};
#[doc(inline)]
pub use crate::config::{AnalyzerBuilder, AnalyzerConfig};
#[doc(inline)]
pub use crate::error::{CaptureError, ConfigError, ConsumerFailure};
#[doc(inline)]
pub use crate::frame::{Cumulative, FeatureFrame, Levels};
#[doc(inline)]
pub use crate::pipeline::{Pipeline, PipelineControl, Tick};
#[doc(inline)]
pub use crate::scheduler::{Clock, ManualClock, MonotonicClock, Scheduler};
#[doc(inline)]
pub use crate::shared::{SharedFrame, SharedFrameReader};

/// `ezconf` configuration
///
/// Usually you will call [`default_config`](fn.default_config.html) in the beginning
/// which will populate this object, but you can also specify your own custom config
/// sources.
///
/// # Example
/// ```rust
/// # mic_core::default_config();
/// let threshold = mic_core::CONFIG.get_or(
///     // Toml path to value
///     "onset.threshold",
///     // Default value.  Type gets inferred from this
///     0.5,
/// );
/// # assert!(threshold > 0.0);
/// ```
pub static CONFIG: ezconf::Config = ezconf::INIT;

/// Initialize config from default sources
///
/// The default sources are:
/// * `./mic.toml`
/// * `./config/mic.toml`
/// * Defaults from code
pub fn default_config() {
    CONFIG
        .init(
            [
                ezconf::Source::File("mic.toml"),
                ezconf::Source::File("config/mic.toml"),
            ]
            .iter(),
        )
        .expect("Can't load config");
}

/// Initialize logger
///
/// By default, enable debug output in debug-builds.
pub fn default_log() {
    #[cfg(not(debug_assertions))]
    env_logger::init();

    #[cfg(debug_assertions)]
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    color_backtrace::install();
}
