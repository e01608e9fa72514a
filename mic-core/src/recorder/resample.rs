//! Linear resampling between device and analysis rate

/// Streaming linear interpolator
///
/// Keeps the last sample of the previous chunk so chunk boundaries interpolate seamlessly.
#[derive(Debug, Clone)]
pub struct Resampler {
    from: usize,
    to: usize,
    step: f64,
    pos: f64,
    last: f32,
}

impl Resampler {
    pub fn new(from: usize, to: usize) -> Resampler {
        Resampler {
            from,
            to,
            step: from as f64 / to.max(1) as f64,
            pos: 0.0,
            last: 0.0,
        }
    }

    #[inline]
    pub fn is_passthrough(&self) -> bool {
        self.from == self.to
    }

    /// Resample `input` and append the result to `out`
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        if self.is_passthrough() {
            out.extend_from_slice(input);
            return;
        }
        if input.is_empty() {
            return;
        }

        // Index 0 is the last sample of the previous chunk, index `k` is `input[k - 1]`
        let last = self.last;
        let at = |k: usize| if k == 0 { last } else { input[k - 1] };
        let n = input.len() as f64;

        while self.pos < n {
            let i = self.pos.floor() as usize;
            let frac = (self.pos - i as f64) as f32;
            let (a, b) = (at(i), at(i + 1));
            out.push(a + (b - a) * frac);
            self.pos += self.step;
        }

        self.pos -= n;
        self.last = input[input.len() - 1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let mut r = Resampler::new(48000, 48000);
        let mut out = Vec::new();
        r.process(&[0.1, 0.2, 0.3], &mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_upsample() {
        let mut r = Resampler::new(1, 2);
        let mut out = Vec::new();
        r.process(&[1.0, 2.0, 3.0], &mut out);

        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);

        // Continues seamlessly into the next chunk
        out.clear();
        r.process(&[4.0], &mut out);
        assert_eq!(out, vec![3.0, 3.5]);
    }

    #[test]
    fn test_downsample_count() {
        let mut r = Resampler::new(48000, 24000);
        let mut out = Vec::new();

        for _ in 0..10 {
            r.process(&[0.25; 480], &mut out);
        }

        assert_eq!(out.len(), 2400);
        assert!(out[1..].iter().all(|s| (*s - 0.25).abs() < 1e-6));
    }
}
