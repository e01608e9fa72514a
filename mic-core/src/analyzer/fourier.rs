//! Fourier Analysis
use super::Sample;
use rustfft::num_complex::Complex;

/// Lowest value a spectrum bin can take, in dB.  Stands in for silence.
pub const DB_FLOOR: f32 = -100.0;

/// Window functions
///
/// A window-function takes a size and returns a `Vec` of that length filled with the
/// precomputed window coefficients.
pub mod window {
    /// Hanning Window
    ///
    /// `0.5 * (1 - cos(2πi / (n - 1)))`
    pub fn hanning(size: usize) -> Vec<f32> {
        apodize::hanning_iter(size).map(|f| f as f32).collect()
    }

    /// No window function / Rectangle window
    pub fn none(size: usize) -> Vec<f32> {
        vec![1.0; size]
    }

    /// Get the window function for the specified name
    pub fn from_str(name: &str) -> Option<fn(usize) -> Vec<f32>> {
        match name {
            "hanning" => Some(hanning),
            "none" => Some(none),
            _ => None,
        }
    }
}

/// Tapers a sample buffer before transformation
///
/// Coefficients are computed once per buffer length and reused afterwards.
#[derive(Clone)]
pub struct Windower {
    func: fn(usize) -> Vec<f32>,
    coefficients: Vec<f32>,
}

impl std::fmt::Debug for Windower {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Windower {{ length: {:?} }}", self.coefficients.len())
    }
}

impl Default for Windower {
    fn default() -> Self {
        Windower::new(window::hanning)
    }
}

impl Windower {
    pub fn new(func: fn(usize) -> Vec<f32>) -> Windower {
        Windower {
            func,
            coefficients: Vec::new(),
        }
    }

    /// Window `buffer` into a newly allocated buffer of the same length
    pub fn apply(&mut self, buffer: &[Sample]) -> Vec<Sample> {
        let mut out = Vec::with_capacity(buffer.len());
        self.apply_into(buffer, &mut out);
        out
    }

    /// Window `buffer` into `out`, reusing its allocation
    ///
    /// Buffers shorter than two samples are copied unchanged.
    pub fn apply_into(&mut self, buffer: &[Sample], out: &mut Vec<Sample>) {
        out.clear();

        if buffer.len() < 2 {
            out.extend_from_slice(buffer);
            return;
        }

        if self.coefficients.len() != buffer.len() {
            log::trace!("Windower: computing {} coefficients", buffer.len());
            self.coefficients = (self.func)(buffer.len());
        }

        out.extend(
            buffer
                .iter()
                .zip(self.coefficients.iter())
                .map(|(s, w)| s * w),
        );
    }
}

/// Magnitude spectrum in dB
///
/// Bin `k` of the output corresponds to frequency `k * rate / length`, so indices are in
/// ascending frequency order and stable for a given length.
pub struct SpectralAnalyzer {
    length: usize,
    bins: usize,
    smoothing: f32,

    fft: std::sync::Arc<dyn rustfft::Fft<Sample>>,
    buffer: Vec<Complex<Sample>>,
    scratch: Vec<Complex<Sample>>,

    magnitudes: Vec<f32>,
    spectrum: Vec<f32>,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "SpectralAnalyzer {{ length: {:?}, bins: {:?}, smoothing: {:?} }}",
            self.length, self.bins, self.smoothing,
        )
    }
}

impl SpectralAnalyzer {
    /// Plan a transform over windows of `length` samples
    ///
    /// `smoothing` blends each bin's linear magnitude with its previous value, `0.0` means
    /// every tick stands on its own.
    pub fn new(length: usize, smoothing: f32) -> SpectralAnalyzer {
        let fft = rustfft::FftPlanner::new().plan_fft_forward(length);
        let bins = length / 2;
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        let sa = SpectralAnalyzer {
            length,
            bins,
            smoothing,

            fft,
            buffer: vec![Complex::new(0.0, 0.0); length],
            scratch,

            magnitudes: vec![0.0; bins],
            spectrum: vec![DB_FLOOR; bins],
        };

        log::debug!("SpectralAnalyzer({:p}):", &sa);
        log::debug!("    Fourier Length      = {:8}", length);
        log::debug!("    Bins                = {:8}", bins);
        log::debug!("    Smoothing           = {:8.3}", smoothing);

        sa
    }

    #[inline]
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Width of one bin in Hz at the given sample rate
    pub fn bin_width(&self, rate: usize) -> f32 {
        rate as f32 / self.length as f32
    }

    /// Transform a windowed buffer
    ///
    /// Shorter input is zero-padded, longer input truncated to the planned length.
    pub fn analyze(&mut self, windowed: &[Sample]) -> &[f32] {
        log::trace!("SpectralAnalyzer({:p}): Analyzing ...", &self);

        for (i, c) in self.buffer.iter_mut().enumerate() {
            let s = windowed.get(i).copied().unwrap_or(0.0);
            *c = Complex::new(crate::helpers::finite_or_zero(s), 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let norm = 1.0 / self.length as f32;
        let keep = self.smoothing;
        for ((m, db), c) in self
            .magnitudes
            .iter_mut()
            .zip(self.spectrum.iter_mut())
            .zip(self.buffer.iter())
        {
            *m = keep * *m + (1.0 - keep) * c.norm() * norm;
            *db = to_db(*m);
        }

        &self.spectrum
    }

    /// The spectrum computed by the last call to [`analyze`](Self::analyze)
    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    /// Forget smoothing history
    pub fn reset(&mut self) {
        for m in self.magnitudes.iter_mut() {
            *m = 0.0;
        }
        for db in self.spectrum.iter_mut() {
            *db = DB_FLOOR;
        }
    }
}

/// Convert a linear magnitude to dB, clamped to [`DB_FLOOR`]
#[inline]
pub fn to_db(magnitude: f32) -> f32 {
    if magnitude > 0.0 && magnitude.is_finite() {
        (20.0 * magnitude.log10()).max(DB_FLOOR)
    } else {
        DB_FLOOR
    }
}
