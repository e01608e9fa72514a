//! Latest-frame handoff to another thread
//!
//! A [`SharedFrame`] is a bus consumer that publishes every frame into a triple buffer.  The
//! matching [`SharedFrameReader`] always sees the most recent frame without blocking the
//! tick loop, e.g. from a render thread running at its own rate.
use crate::bus::{Consumer, ConsumerError};
use crate::frame::FeatureFrame;

#[derive(Debug)]
pub struct SharedFrame {
    input: triple_buffer::Input<FeatureFrame>,
}

#[derive(Debug)]
pub struct SharedFrameReader {
    output: triple_buffer::Output<FeatureFrame>,
}

impl SharedFrame {
    /// Create a linked writer and reader, starting out with a zeroed frame
    pub fn new(bucket_count: usize) -> (SharedFrame, SharedFrameReader) {
        let (input, output) =
            triple_buffer::TripleBuffer::new(&FeatureFrame::zeroed(bucket_count)).split();

        (SharedFrame { input }, SharedFrameReader { output })
    }
}

impl Consumer for SharedFrame {
    fn consume(&mut self, frame: &FeatureFrame) -> Result<(), ConsumerError> {
        self.input.write(frame.clone());
        Ok(())
    }
}

impl SharedFrameReader {
    /// The most recently published frame
    pub fn read(&mut self) -> &FeatureFrame {
        self.output.read()
    }

    pub fn lock_info<F, O>(&mut self, f: F) -> O
    where
        F: FnOnce(&FeatureFrame) -> O,
    {
        f(self.output.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FeatureBus;

    #[test]
    fn test_latest_wins() {
        let (shared, mut reader) = SharedFrame::new(3);
        assert_eq!(*reader.read(), FeatureFrame::zeroed(3));

        let mut bus = FeatureBus::default();
        bus.subscribe(shared);

        for i in 0..5 {
            bus.publish(&FeatureFrame {
                frame: i,
                ..FeatureFrame::zeroed(3)
            });
        }

        assert_eq!(reader.lock_info(|f| f.frame), 4);
    }

    #[test]
    fn test_across_threads() {
        let (mut shared, mut reader) = SharedFrame::new(7);

        std::thread::spawn(move || {
            let frame = FeatureFrame {
                rms: 0.5,
                kick_count: 3,
                ..FeatureFrame::zeroed(7)
            };
            shared.consume(&frame).unwrap();
        })
        .join()
        .unwrap();

        let f = reader.read();
        assert_eq!(f.rms, 0.5);
        assert_eq!(f.kick_count, 3);
    }
}
