pub mod features;
pub mod fourier;
pub mod onset;
pub mod samples;

pub use self::features::{FeatureExtractor, Features};
pub use self::fourier::{window, SpectralAnalyzer, Windower, DB_FLOOR};
pub use self::onset::{Onset, OnsetDetector};
pub use self::samples::{Sample, SampleBuffer};
