//! Sample bus between producers and the bridge.

use hvgate_types::Sample;
use tokio::sync::broadcast;


/// Receiver side of the sample bus.
pub type SampleReceiver = broadcast::Receiver<Sample>;

/// Default number of samples buffered per subscriber.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Fan-out of [`Sample`]s from any number of producers.
///
/// Publishing never blocks. A subscriber that falls more than the capacity
/// behind loses the oldest samples and is told how many on its next receive.
/// Clones share the same bus.
#[derive(Debug, Clone)]
pub struct ChannelBus {
    sender: broadcast::Sender<Sample>,
}

impl ChannelBus {
    /// Create a bus buffering up to `capacity` samples per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to samples published from now on.
    pub fn subscribe(&self) -> SampleReceiver {
        self.sender.subscribe()
    }

    /// Publish a sample. Returns the number of subscribers that will see it.
    pub fn publish(&self, sample: Sample) -> usize {
        // no subscribers is not an error
        self.sender.send(sample).unwrap_or(0)
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChannelBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn sample(value: f64) -> Sample {
        Sample::new("oximeter.pulse", value, OffsetDateTime::UNIX_EPOCH).unwrap()
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = ChannelBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.clone().subscribe();
        assert_eq!(bus.receiver_count(), 2);

        assert_eq!(bus.publish(sample(72.0)), 2);
        assert_eq!(a.recv().await.unwrap().value, 72.0);
        assert_eq!(b.recv().await.unwrap().value, 72.0);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = ChannelBus::new(4);
        assert_eq!(bus.publish(sample(1.0)), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_is_told() {
        let bus = ChannelBus::new(2);
        let mut rx = bus.subscribe();
        for v in 0..5 {
            bus.publish(sample(f64::from(v)));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap().value, 3.0);
    }
}
