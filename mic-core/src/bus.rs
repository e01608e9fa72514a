//! Fan-out of frames to subscribed consumers
//!
//! Consumers are called synchronously, in subscription order.  A consumer that returns an
//! error or panics is reported and skipped for this frame only; the others still receive it.
use crate::error::ConsumerFailure;
use crate::frame::FeatureFrame;
use std::panic;

pub type ConsumerError = Box<dyn std::error::Error + Send + Sync>;

/// Something that receives every published frame
pub trait Consumer: Send {
    fn consume(&mut self, frame: &FeatureFrame) -> Result<(), ConsumerError>;
}

impl<F> Consumer for F
where
    F: FnMut(&FeatureFrame) + Send,
{
    fn consume(&mut self, frame: &FeatureFrame) -> Result<(), ConsumerError> {
        self(frame);
        Ok(())
    }
}

/// Opaque token returned by [`FeatureBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    #[inline]
    pub fn id(&self) -> u64 {
        self.0
    }
}

struct Subscription {
    handle: SubscriptionHandle,
    consumer: Box<dyn Consumer>,
}

pub struct FeatureBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
    gain: f32,
}

impl std::fmt::Debug for FeatureBus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let handles: Vec<_> = self.subscriptions.iter().map(|s| s.handle).collect();

        f.debug_struct("FeatureBus")
            .field("subscriptions", &handles)
            .field("next_id", &self.next_id)
            .field("gain", &self.gain)
            .finish()
    }
}

impl Default for FeatureBus {
    fn default() -> Self {
        FeatureBus::new(1.0)
    }
}

impl FeatureBus {
    /// Create a bus scaling `rms` by `gain` in every delivered frame
    pub fn new(gain: f32) -> FeatureBus {
        FeatureBus {
            subscriptions: Vec::new(),
            next_id: 0,
            gain,
        }
    }

    pub fn subscribe<C: Consumer + 'static>(&mut self, consumer: C) -> SubscriptionHandle {
        self.subscribe_boxed(Box::new(consumer))
    }

    pub fn subscribe_boxed(&mut self, consumer: Box<dyn Consumer>) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_id);
        self.next_id += 1;

        self.subscriptions.push(Subscription { handle, consumer });
        log::debug!("FeatureBus: subscribed consumer {}", handle.0);

        handle
    }

    /// Remove a consumer.  Unknown or already removed handles are ignored.
    ///
    /// Returns whether a consumer was removed.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.handle != handle);

        let removed = self.subscriptions.len() != before;
        if removed {
            log::debug!("FeatureBus: unsubscribed consumer {}", handle.0);
        }
        removed
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Deliver `frame` to every consumer
    pub fn publish(&mut self, frame: &FeatureFrame) -> Vec<ConsumerFailure> {
        let mut failures = Vec::new();
        if self.subscriptions.is_empty() {
            return failures;
        }

        let scaled;
        let frame = if self.gain == 1.0 {
            frame
        } else {
            scaled = FeatureFrame {
                rms: frame.rms * self.gain,
                ..frame.clone()
            };
            &scaled
        };

        for sub in self.subscriptions.iter_mut() {
            let consumer = &mut sub.consumer;
            let reason = match panic::catch_unwind(panic::AssertUnwindSafe(|| {
                consumer.consume(frame)
            })) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(&*payload),
            };

            let failure = ConsumerFailure {
                subscription: sub.handle.0,
                reason,
            };
            log::warn!("{}", failure);
            failures.push(failure);
        }

        failures
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn frame(rms: f32) -> FeatureFrame {
        FeatureFrame {
            rms,
            ..FeatureFrame::zeroed(7)
        }
    }

    struct Failing;

    impl Consumer for Failing {
        fn consume(&mut self, _: &FeatureFrame) -> Result<(), ConsumerError> {
            Err("sink closed".into())
        }
    }

    #[test]
    fn test_order() {
        let mut bus = FeatureBus::default();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            bus.subscribe(move |_: &FeatureFrame| log.lock().unwrap().push(i));
        }

        assert!(bus.publish(&frame(0.1)).is_empty());
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = FeatureBus::default();
        let count = Arc::new(Mutex::new(0));

        let c = count.clone();
        let handle = bus.subscribe(move |_: &FeatureFrame| *c.lock().unwrap() += 1);

        bus.publish(&frame(0.1));
        assert!(bus.unsubscribe(handle));
        assert!(!bus.unsubscribe(handle));
        bus.publish(&frame(0.1));

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_isolation() {
        let mut bus = FeatureBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        bus.subscribe(move |f: &FeatureFrame| s.lock().unwrap().push(("a", f.rms)));
        let bad = bus.subscribe(|_: &FeatureFrame| panic!("consumer bug"));
        let failing = bus.subscribe(Failing);
        let s = seen.clone();
        bus.subscribe(move |f: &FeatureFrame| s.lock().unwrap().push(("d", f.rms)));

        let failures = bus.publish(&frame(0.25));

        assert_eq!(*seen.lock().unwrap(), vec![("a", 0.25), ("d", 0.25)]);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].subscription, bad.id());
        assert_eq!(failures[0].reason, "panicked: consumer bug");
        assert_eq!(failures[1].subscription, failing.id());
        assert_eq!(failures[1].reason, "sink closed");

        // Faulty consumers stay subscribed
        assert_eq!(bus.len(), 4);
    }

    #[test]
    fn test_gain() {
        let mut bus = FeatureBus::new(2.0);
        let seen = Arc::new(Mutex::new(0.0));

        let s = seen.clone();
        bus.subscribe(move |f: &FeatureFrame| *s.lock().unwrap() = f.rms);
        bus.publish(&frame(0.25));

        assert_eq!(*seen.lock().unwrap(), 0.5);
    }
}
