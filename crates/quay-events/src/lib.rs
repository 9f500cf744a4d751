// Typed pub/sub bus. Producers post envelopes; each live subscriber gets a
// clone through its own bounded buffer. Slow subscribers lose the oldest
// envelopes first and the poster learns how many were dropped; producers
// never block on subscriber progress.

mod publisher;

pub use publisher::Publisher;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::Stream;
use tokio::sync::Notify;

// ──────────────────────────────────────────────
// Policies and reports
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferingPolicy {
    /// Keep at most `cap` envelopes; when full, drop the oldest buffered
    /// envelope to make room for the incoming one.
    BufferingNewest(usize),
    Unbounded,
}

/// What happened to one `post` across all live subscribers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostReport {
    pub delivered: u32,
    pub dropped: u32,
}

// ──────────────────────────────────────────────
// Bus
// ──────────────────────────────────────────────

pub struct EventBus<E> {
    subscribers: Mutex<Vec<Arc<SubscriberQueue<E>>>>,
}

struct SubscriberQueue<E> {
    policy: BufferingPolicy,
    state: Mutex<QueueState<E>>,
    notify: Notify,
}

struct QueueState<E> {
    buffer: VecDeque<E>,
    closed: bool,
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, policy: BufferingPolicy) -> Subscription<E> {
        let queue = Arc::new(SubscriberQueue {
            policy,
            state: Mutex::new(QueueState {
                buffer: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        });
        self.subscribers.lock().unwrap().push(queue.clone());
        Subscription { queue }
    }

    /// Deliver a clone of `envelope` to every live subscriber. Returns after
    /// the delivery/drop decision has been made for all of them; subscribers
    /// whose handle was dropped are discarded here.
    pub fn post(&self, envelope: E) -> PostReport {
        let mut report = PostReport::default();
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|queue| {
            let mut state = queue.state.lock().unwrap();
            if state.closed {
                return false;
            }
            state.buffer.push_back(envelope.clone());
            if let BufferingPolicy::BufferingNewest(cap) = queue.policy {
                while state.buffer.len() > cap {
                    state.buffer.pop_front();
                    report.dropped += 1;
                }
            }
            report.delivered += 1;
            drop(state);
            queue.notify.notify_one();
            true
        });
        report
    }

    /// Close every subscription. Buffered envelopes remain readable; once a
    /// subscriber drains its buffer it observes end-of-stream. A closed bus
    /// is not restartable.
    pub fn close(&self) {
        let subscribers = self.subscribers.lock().unwrap();
        for queue in subscribers.iter() {
            queue.state.lock().unwrap().closed = true;
            queue.notify.notify_one();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────────────────────────────────
// Subscription
// ──────────────────────────────────────────────

/// Receiving half of a subscription. Dropping it unsubscribes: the bus
/// discards the queue on the next post.
pub struct Subscription<E> {
    queue: Arc<SubscriberQueue<E>>,
}

impl<E: Clone + Send + 'static> Subscription<E> {
    /// Next envelope in FIFO order, or `None` after the bus is closed and
    /// the buffer is drained.
    pub async fn recv(&self) -> Option<E> {
        loop {
            // Register for notification before checking state, so a post
            // between the check and the await cannot be missed.
            let notified = self.queue.notify.notified();
            {
                let mut state = self.queue.state.lock().unwrap();
                if let Some(envelope) = state.buffer.pop_front() {
                    return Some(envelope);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Non-blocking variant of `recv`.
    pub fn try_recv(&self) -> Option<E> {
        self.queue.state.lock().unwrap().buffer.pop_front()
    }

    pub fn into_stream(self) -> impl Stream<Item = E> {
        async_stream::stream! {
            while let Some(envelope) = self.recv().await {
                yield envelope;
            }
        }
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.queue.state.lock().unwrap().closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ──────────────────────────────────────────
    // Delivery and ordering
    // ──────────────────────────────────────────

    #[tokio::test]
    async fn test_post_delivers_to_all_subscribers_in_fifo_order() {
        let bus = EventBus::new();
        let a = bus.subscribe(BufferingPolicy::Unbounded);
        let b = bus.subscribe(BufferingPolicy::Unbounded);

        for i in 0..5u32 {
            let report = bus.post(i);
            assert_eq!(report.delivered, 2);
            assert_eq!(report.dropped, 0);
        }

        for i in 0..5u32 {
            assert_eq!(a.recv().await, Some(i));
            assert_eq!(b.recv().await, Some(i));
        }
    }

    #[tokio::test]
    async fn test_post_with_no_subscribers_reports_zero() {
        let bus: EventBus<u32> = EventBus::new();
        assert_eq!(bus.post(1), PostReport::default());
    }

    // ──────────────────────────────────────────
    // Backpressure
    // ──────────────────────────────────────────

    #[tokio::test]
    async fn test_buffering_newest_drops_oldest_and_reports_counts() {
        let bus = EventBus::new();
        let sub = bus.subscribe(BufferingPolicy::BufferingNewest(4));

        let mut dropped_total = 0;
        for i in 1..=10u32 {
            dropped_total += bus.post(i).dropped;
        }
        assert_eq!(dropped_total, 6);

        // The newest four survive, still in FIFO order.
        for expected in 7..=10u32 {
            assert_eq!(sub.recv().await, Some(expected));
        }
        assert_eq!(sub.try_recv(), None);
    }

    // ──────────────────────────────────────────
    // Unsubscription and close
    // ──────────────────────────────────────────

    #[tokio::test]
    async fn test_dropped_subscriber_is_removed_on_next_post() {
        let bus = EventBus::new();
        let keep = bus.subscribe(BufferingPolicy::Unbounded);
        let gone = bus.subscribe(BufferingPolicy::Unbounded);
        drop(gone);

        assert_eq!(bus.subscriber_count(), 2);
        let report = bus.post(7u32);
        assert_eq!(report.delivered, 1);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_close_ends_stream_after_draining() {
        let bus = EventBus::new();
        let sub = bus.subscribe(BufferingPolicy::Unbounded);
        bus.post(1u32);
        bus.post(2u32);
        bus.close();

        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, Some(2));
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_recv_wakes_on_post() {
        let bus = Arc::new(EventBus::new());
        let sub = bus.subscribe(BufferingPolicy::Unbounded);

        let poster = {
            let bus = bus.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                bus.post(42u32);
            })
        };

        assert_eq!(sub.recv().await, Some(42));
        poster.await.unwrap();
    }

    #[tokio::test]
    async fn test_into_stream_yields_posted_envelopes() {
        use futures::StreamExt;

        let bus = EventBus::new();
        let sub = bus.subscribe(BufferingPolicy::Unbounded);
        bus.post(1u32);
        bus.post(2u32);
        bus.close();

        let collected: Vec<u32> = sub.into_stream().collect().await;
        assert_eq!(collected, vec![1, 2]);
    }
}
