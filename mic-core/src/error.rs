//! Error types
//!
//! Nothing in here is fatal to the tick loop: capture errors put the pipeline into
//! its idle state and consumer failures are reported per consumer.

/// Failure to acquire an audio input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("Access to the audio input was denied")]
    PermissionDenied,

    #[error("No audio input device available")]
    DeviceUnavailable,

    #[error("Audio backend error: {0}")]
    Stream(String),
}

/// Invalid analyzer configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Buffer size {0} is not a power of two")]
    BufferNotPowerOfTwo(usize),

    #[error("Bucket count must be at least 1")]
    NoBuckets,

    #[error("Bucket count {buckets} exceeds the {bins} available spectrum bins")]
    TooManyBuckets { buckets: usize, bins: usize },

    #[error("{name} = {value} is outside of [0, 1]")]
    OutOfUnitRange { name: &'static str, value: f32 },

    #[error("{name} = {value} must be finite and positive")]
    NotPositive { name: &'static str, value: f32 },

    #[error("Unknown window function {0:?}")]
    UnknownWindow(String),
}

/// A consumer faulted while being handed a frame
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Consumer {subscription} failed: {reason}")]
pub struct ConsumerFailure {
    pub subscription: u64,
    pub reason: String,
}

/// Why a sample buffer could not be analyzed.  Recovered locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum MalformedBuffer {
    #[error("empty sample buffer")]
    Empty,
    #[error("non-finite sample at index {index}")]
    NonFinite { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(MalformedBuffer::Empty.to_string(), "empty sample buffer");
        assert_eq!(
            MalformedBuffer::NonFinite { index: 3 }.to_string(),
            "non-finite sample at index 3"
        );

        let failure = ConsumerFailure {
            subscription: 2,
            reason: "boom".to_string(),
        };
        assert_eq!(failure.to_string(), "Consumer 2 failed: boom");
    }
}
