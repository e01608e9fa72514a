//! Per-tick scalar and band features
use super::fourier::DB_FLOOR;
use super::Sample;
use crate::error::MalformedBuffer;
use crate::frame::Levels;

/// Features derived from one sample buffer and its spectrum
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    pub rms: f32,
    pub zcr: f32,
    pub bands: Vec<f32>,
    pub levels: Levels,
}

impl Features {
    pub fn zeroed(bucket_count: usize) -> Features {
        Features {
            rms: 0.0,
            zcr: 0.0,
            bands: vec![0.0; bucket_count],
            levels: Levels::default(),
        }
    }
}

/// Root mean square of `samples`.  Empty input yields `0.0`.
pub fn rms(samples: &[Sample]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Fraction of neighbouring sample pairs whose sign differs
///
/// Zero counts as positive.  Buffers with fewer than two samples yield `0.0`.
pub fn zcr(samples: &[Sample]) -> f32 {
    if samples.len() <= 1 {
        return 0.0;
    }

    let crossings = samples
        .windows(2)
        .filter(|w| (w[1] >= 0.0) != (w[0] >= 0.0))
        .count();

    crossings as f32 / (samples.len() - 1) as f32
}

/// Map a mean dB value onto `[0, 1]`
#[inline]
pub fn normalize_db(db: f32) -> f32 {
    ((db - DB_FLOOR) / -DB_FLOOR).clamp(0.0, 1.0)
}

fn mean_normalized(bins: &[f32]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }

    let mean = bins.iter().sum::<f32>() / bins.len() as f32;
    crate::helpers::finite_or_zero(normalize_db(mean))
}

/// Number of bins per band for an equal, non-overlapping partition
#[inline]
pub fn bucket_size(bins: usize, bucket_count: usize) -> usize {
    if bucket_count == 0 {
        0
    } else {
        bins / bucket_count
    }
}

/// Average `spectrum` into `out.len()` contiguous bands
///
/// Bins past `out.len() * bucket_size` are not used.
pub fn fill_bands(spectrum: &[f32], out: &mut [f32]) {
    let size = bucket_size(spectrum.len(), out.len());

    if size == 0 {
        for b in out.iter_mut() {
            *b = 0.0;
        }
        return;
    }

    for (b, chunk) in out.iter_mut().zip(spectrum.chunks_exact(size)) {
        *b = mean_normalized(chunk);
    }
}

/// Coarse low / mid / high split of the spectrum at 20% and 70% of the bins
pub fn levels(spectrum: &[f32]) -> Levels {
    let n = spectrum.len();
    let low_end = n / 5;
    let mid_end = n * 7 / 10;

    Levels {
        low: mean_normalized(&spectrum[..low_end]),
        mid: mean_normalized(&spectrum[low_end..mid_end]),
        high: mean_normalized(&spectrum[mid_end..]),
    }
}

/// Reject buffers that cannot be analyzed
pub(crate) fn check(samples: &[Sample]) -> Result<(), MalformedBuffer> {
    if samples.is_empty() {
        return Err(MalformedBuffer::Empty);
    }

    match samples.iter().position(|s| !s.is_finite()) {
        Some(index) => Err(MalformedBuffer::NonFinite { index }),
        None => Ok(()),
    }
}

/// Derives [`Features`] each tick
///
/// The number of bands is fixed when the extractor is created.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    bucket_count: usize,
}

impl FeatureExtractor {
    pub fn new(bucket_count: usize) -> FeatureExtractor {
        log::debug!("FeatureExtractor: {} buckets", bucket_count);

        FeatureExtractor { bucket_count }
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Extract features from the raw (unwindowed) buffer and its spectrum
    ///
    /// Never fails: a malformed buffer yields all-zero features.
    pub fn extract(&self, samples: &[Sample], spectrum: &[f32]) -> Features {
        if let Err(e) = check(samples) {
            log::debug!("FeatureExtractor: substituting zero features ({})", e);
            return Features::zeroed(self.bucket_count);
        }

        let mut bands = vec![0.0; self.bucket_count];
        fill_bands(spectrum, &mut bands);

        Features {
            rms: rms(samples),
            zcr: zcr(samples),
            bands,
            levels: levels(spectrum),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence() {
        let extractor = FeatureExtractor::new(7);
        let features = extractor.extract(&[0.0; 2048], &[DB_FLOOR; 1024]);

        assert_eq!(features.rms, 0.0);
        assert_eq!(features.zcr, 0.0);
        assert_eq!(features.bands, vec![0.0; 7]);
        assert_eq!(features.levels, Levels::default());
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5; 64]) - 0.5).abs() < 1e-6);
        assert!((rms(&[1.0, -1.0, 1.0, -1.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zcr() {
        assert_eq!(zcr(&[]), 0.0);
        assert_eq!(zcr(&[0.3]), 0.0);
        assert_eq!(zcr(&[0.3; 100]), 0.0);
        assert_eq!(zcr(&[-0.3; 100]), 0.0);

        let alternating: Vec<f32> = (0..101)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        assert!((zcr(&alternating) - 1.0).abs() < 1e-6);

        // zero counts as positive
        assert_eq!(zcr(&[-1.0, 0.0, 1.0]), 0.5);
    }

    #[test]
    fn test_band_partition() {
        assert_eq!(bucket_size(1024, 7), 146);
        assert_eq!(1024 - 7 * bucket_size(1024, 7), 2);

        // Every bin inside the partition sits at -50 dB, the two dropped bins are loud
        let mut spectrum = vec![-50.0; 1024];
        spectrum[1022] = 0.0;
        spectrum[1023] = 0.0;

        let mut bands = [0.0; 7];
        fill_bands(&spectrum, &mut bands);
        for b in bands.iter() {
            assert!((b - 0.5).abs() < 1e-6);
        }

        // Bin 146 starts the second bucket
        let mut spectrum = vec![DB_FLOOR; 1024];
        for db in spectrum[146..292].iter_mut() {
            *db = 0.0;
        }
        fill_bands(&spectrum, &mut bands);
        assert_eq!(bands, [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_band_clamp() {
        let mut bands = [0.0; 2];
        fill_bands(&[20.0, 20.0, -300.0, -300.0], &mut bands);
        assert_eq!(bands, [1.0, 0.0]);
    }

    #[test]
    fn test_more_buckets_than_bins() {
        let mut bands = [1.0; 8];
        fill_bands(&[0.0; 4], &mut bands);
        assert_eq!(bands, [0.0; 8]);
    }

    #[test]
    fn test_levels() {
        let mut spectrum = vec![DB_FLOOR; 100];
        for db in spectrum[..20].iter_mut() {
            *db = 0.0;
        }
        for db in spectrum[70..].iter_mut() {
            *db = -50.0;
        }

        let levels = levels(&spectrum);
        assert_eq!(levels.low, 1.0);
        assert_eq!(levels.mid, 0.0);
        assert!((levels.high - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_malformed() {
        let extractor = FeatureExtractor::new(7);

        let empty = extractor.extract(&[], &[]);
        assert_eq!(empty, Features::zeroed(7));

        let nan = extractor.extract(&[0.5, f32::NAN, 0.5], &[0.0; 1024]);
        assert_eq!(nan, Features::zeroed(7));

        assert_eq!(check(&[]), Err(MalformedBuffer::Empty));
        assert_eq!(
            check(&[0.0, 0.0, f32::INFINITY]),
            Err(MalformedBuffer::NonFinite { index: 2 })
        );
        assert_eq!(check(&[0.0]), Ok(()));
    }
}
