//! In-process status fan-out bus.
//!
//! [`StatusBus`] distributes [`StatusEvent`]s to any number of streaming
//! subscribers without letting one slow subscriber stall ingestion or its
//! peers. It is built on [`tokio::sync::broadcast`], whose ring buffer is
//! exactly the required backpressure policy: publishing never blocks, and
//! a subscriber that falls more than the channel capacity behind loses
//! the oldest events, observed as a gap in sequence numbers rather than
//! an error.
//!
//! Events preserve publish order per subscriber; there is no ordering
//! guarantee across subscribers, and delivery is at-most-once.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use exalink_core::events::StatusEvent;
use exalink_core::types::Status;

/// Default per-subscriber queue capacity.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Publish/subscribe hub for status events.
pub struct StatusBus {
    tx: broadcast::Sender<StatusEvent>,
    next_seq: AtomicU64,
}

impl StatusBus {
    /// Create a bus whose subscribers each buffer up to `capacity`
    /// events before the oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        StatusBus {
            tx,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Publish a status update. Never fails and never blocks.
    ///
    /// Returns the assigned sequence number. With no subscribers the
    /// event is simply discarded.
    pub fn publish(&self, composition: &str, status: Status) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let event = StatusEvent {
            seq,
            composition: composition.to_string(),
            status,
        };
        // send only errors when no receiver exists, which is fine.
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(seq, composition, subscribers = delivered, "published status event");
        seq
    }

    /// Register a new subscriber.
    ///
    /// The subscription sees only events published after this call.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: Some(self.tx.subscribe()),
            dropped: 0,
            last_seq: None,
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total events published over the bus lifetime.
    pub fn published(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// One streaming consumer's handle into the bus.
///
/// Owned by the transport layer draining it (an SSE writer, a test).
/// Dropping the handle unsubscribes implicitly.
pub struct Subscription {
    rx: Option<broadcast::Receiver<StatusEvent>>,
    dropped: u64,
    last_seq: Option<u64>,
}

impl Subscription {
    /// Receive the next status event.
    ///
    /// Returns `None` after [`unsubscribe`](Subscription::unsubscribe) or
    /// once the bus is gone. Lag is absorbed transparently: dropped
    /// events are added to [`dropped`](Subscription::dropped) and the
    /// stream continues from the oldest retained event -- subscribers
    /// never see errors, only gaps.
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        loop {
            let result = match self.rx.as_mut() {
                Some(rx) => rx.recv().await,
                None => return None,
            };
            match result {
                Ok(event) => {
                    self.last_seq = Some(event.seq);
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    self.dropped += missed;
                    debug!(
                        missed,
                        total_dropped = self.dropped,
                        "subscriber lagged, oldest events dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Receive without waiting; `None` when no event is ready.
    pub fn try_recv(&mut self) -> Option<StatusEvent> {
        loop {
            let result = match self.rx.as_mut() {
                Some(rx) => rx.try_recv(),
                None => return None,
            };
            match result {
                Ok(event) => {
                    self.last_seq = Some(event.seq);
                    return Some(event);
                }
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    self.dropped += missed;
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Closed) => {
                    self.rx = None;
                    return None;
                }
            }
        }
    }

    /// Total events this subscriber has missed to backpressure drops.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Sequence number of the last delivered event.
    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    /// Release the subscription. Idempotent; [`recv`](Subscription::recv)
    /// returns `None` afterwards.
    pub fn unsubscribe(&mut self) {
        self.rx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exalink_core::types::PlaybackState;
    use std::time::Duration;

    fn stopped() -> Status {
        Status::zeroed(PlaybackState::Stopped)
    }

    fn playing_at(seconds: f64) -> Status {
        let mut status = Status::zeroed(PlaybackState::Playing);
        status.time_seconds = seconds;
        status
    }

    #[tokio::test]
    async fn publish_assigns_increasing_sequence_numbers() {
        let bus = StatusBus::default();
        let mut sub = bus.subscribe();

        assert_eq!(bus.publish("comp1", stopped()), 1);
        assert_eq!(bus.publish("comp2", stopped()), 2);
        assert_eq!(bus.publish("comp1", stopped()), 3);
        assert_eq!(bus.published(), 3);

        assert_eq!(sub.recv().await.unwrap().seq, 1);
        assert_eq!(sub.recv().await.unwrap().seq, 2);
        assert_eq!(sub.recv().await.unwrap().seq, 3);
        assert_eq!(sub.last_seq(), Some(3));
    }

    #[tokio::test]
    async fn fans_out_to_every_subscriber() {
        let bus = StatusBus::default();
        let mut sub_a = bus.subscribe();
        let mut sub_b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish("comp1", playing_at(1.0));

        let event_a = sub_a.recv().await.unwrap();
        let event_b = sub_b.recv().await.unwrap();
        assert_eq!(event_a, event_b);
        assert_eq!(event_a.composition, "comp1");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = StatusBus::default();
        assert_eq!(bus.publish("comp1", stopped()), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_stall_publisher_or_fast_peer() {
        let bus = StatusBus::new(1024);
        let _slow = bus.subscribe(); // never drained
        let mut fast = bus.subscribe();

        // publish() is synchronous and lock-free; 1000 events with a
        // stalled subscriber must complete immediately.
        for i in 0..1000u64 {
            bus.publish("comp1", playing_at(i as f64));
        }

        for expected_seq in 1..=1000u64 {
            let event = fast.recv().await.unwrap();
            assert_eq!(event.seq, expected_seq);
        }
        assert_eq!(fast.dropped(), 0);
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let bus = StatusBus::new(8);
        let mut sub = bus.subscribe();

        for i in 0..100u64 {
            bus.publish("comp1", playing_at(i as f64));
        }

        // The first delivered event is the oldest retained one; everything
        // before it was dropped and counted.
        let first = sub.recv().await.unwrap();
        assert_eq!(first.seq, 93);
        assert_eq!(sub.dropped(), 92);

        let mut last_seq = first.seq;
        while let Some(event) = sub.try_recv() {
            assert_eq!(event.seq, last_seq + 1, "order preserved across the gap");
            last_seq = event.seq;
        }
        assert_eq!(last_seq, 100);
    }

    #[tokio::test]
    async fn late_subscriber_sees_only_new_events() {
        let bus = StatusBus::default();
        bus.publish("comp1", stopped());

        let mut sub = bus.subscribe();
        assert!(sub.try_recv().is_none());

        bus.publish("comp1", playing_at(2.0));
        assert_eq!(sub.recv().await.unwrap().seq, 2);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let bus = StatusBus::default();
        let mut sub = bus.subscribe();

        sub.unsubscribe();
        sub.unsubscribe();

        assert!(sub.recv().await.is_none());
        assert!(sub.try_recv().is_none());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn recv_ends_when_bus_is_dropped() {
        let bus = StatusBus::default();
        let mut sub = bus.subscribe();
        bus.publish("comp1", stopped());
        drop(bus);

        // The buffered event is still delivered, then the stream ends.
        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn concurrent_drain_while_publishing() {
        let bus = std::sync::Arc::new(StatusBus::new(64));
        let mut sub = bus.subscribe();

        let publisher = {
            let bus = std::sync::Arc::clone(&bus);
            tokio::spawn(async move {
                for i in 0..200u64 {
                    bus.publish("comp1", playing_at(i as f64));
                    if i % 16 == 0 {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    }
                }
            })
        };

        let mut received = 0u64;
        let mut previous_seq = 0u64;
        while received + sub.dropped() < 200 {
            let event = sub.recv().await.unwrap();
            assert!(event.seq > previous_seq, "publish order preserved");
            previous_seq = event.seq;
            received += 1;
        }

        publisher.await.unwrap();
    }
}
