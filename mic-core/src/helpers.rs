use std::time;

pub fn secs(d: time::Duration) -> f32 {
    d.as_secs() as f32 + d.subsec_nanos() as f32 * 1e-9
}

pub fn millis(d: time::Duration) -> f32 {
    d.as_secs() as f32 * 1e3 + d.subsec_nanos() as f32 * 1e-6
}

/// Zero out NaN and infinities
#[inline]
pub fn finite_or_zero(x: f32) -> f32 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let d = time::Duration::from_millis(1500);
        assert!((secs(d) - 1.5).abs() < 1e-6);
        assert!((millis(d) - 1500.0).abs() < 1e-3);
    }

    #[test]
    fn test_finite() {
        assert_eq!(finite_or_zero(f32::NAN), 0.0);
        assert_eq!(finite_or_zero(f32::NEG_INFINITY), 0.0);
        assert_eq!(finite_or_zero(0.25), 0.25);
    }
}
