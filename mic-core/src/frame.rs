//! The unit handed to consumers once per tick
use std::time::Duration;

/// Slowly integrating totals for long-horizon transitions
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cumulative {
    pub all_rms: f32,
    pub all_low: f32,
    pub all_mid: f32,
    pub all_high: f32,
}

/// Mean energy of the lower 20%, middle 50% and upper 30% of the spectrum, each in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Levels {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

/// Features of one tick
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    /// Tick time, monotonic since the pipeline started
    pub timestamp: Duration,
    /// Index of the tick that produced this frame
    pub frame: usize,

    /// Loudness, `>= 0`
    pub rms: f32,
    /// Zero-crossing rate in `[0, 1]`
    pub zcr: f32,
    /// Normalised band energies, each in `[0, 1]`, lowest frequencies first
    pub bands: Vec<f32>,
    pub levels: Levels,

    /// Decaying strength of the last kick, in `[0, 1]`
    pub kick_intensity: f32,
    /// Number of kicks since the session started
    pub kick_count: u64,
    /// Whether a kick triggered during this tick
    pub kicked: bool,

    pub cumulative: Cumulative,
}

impl FeatureFrame {
    /// A frame with every feature at zero
    pub fn zeroed(bucket_count: usize) -> FeatureFrame {
        FeatureFrame {
            timestamp: Duration::ZERO,
            frame: 0,
            rms: 0.0,
            zcr: 0.0,
            bands: vec![0.0; bucket_count],
            levels: Levels::default(),
            kick_intensity: 0.0,
            kick_count: 0,
            kicked: false,
            cumulative: Cumulative::default(),
        }
    }

    /// Band energy of the lowest band
    pub fn low(&self) -> f32 {
        self.bands.first().copied().unwrap_or(0.0)
    }

    /// Band energy of the middle band
    pub fn mid(&self) -> f32 {
        self.bands.get(self.bands.len() / 2).copied().unwrap_or(0.0)
    }

    /// Band energy of the highest band
    pub fn high(&self) -> f32 {
        self.bands.last().copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_accessors() {
        let mut frame = FeatureFrame::zeroed(7);
        frame.bands = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7];

        assert_eq!(frame.low(), 0.1);
        assert_eq!(frame.mid(), 0.4);
        assert_eq!(frame.high(), 0.7);
    }

    #[test]
    fn test_no_bands() {
        let frame = FeatureFrame::zeroed(0);
        assert_eq!(frame.low(), 0.0);
        assert_eq!(frame.mid(), 0.0);
        assert_eq!(frame.high(), 0.0);
    }
}
