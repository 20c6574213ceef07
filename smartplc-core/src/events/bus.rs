//! Observer bus delivering event batches to subscribers.
//!
//! Every subscriber owns a bounded ring (`crossbeam::queue::ArrayQueue`).
//! Publishing never waits on a consumer: when a ring is full the oldest
//! unread batch is displaced and a warning is logged.
//!
//! Guarantees per live subscriber:
//! - batches arrive in publication order
//! - a batch is delivered at most once per subscriber
//! - lagging subscribers lose the oldest batches first

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::EventBatch;

/// Observer bus error conditions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Invalid subscriber capacity (must be at least one)")]
    InvalidCapacity,
}

/// Outcome of one publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishReport {
    pub sequence: u64,
    /// Subscribers the batch was queued for.
    pub delivered: usize,
    /// Older batches displaced to make room.
    pub dropped: usize,
}

struct Slot {
    id: u64,
    queue: ArrayQueue<Arc<EventBatch>>,
    active: AtomicBool,
    dropped: AtomicU64,
    notify: Notify,
}

impl Slot {
    fn close(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::AcqRel);
        while self.queue.pop().is_some() {}
        self.notify.notify_one();
        was_active
    }
}

struct InnerBus {
    subscribers: RwLock<Vec<Arc<Slot>>>,
    capacity: usize,
    next_id: AtomicU64,
    next_sequence: AtomicU64,
}

/// Thread-safe publish/subscribe hub. Cloning yields another handle to the
/// same bus.
#[derive(Clone)]
pub struct ObserverBus {
    inner: Arc<InnerBus>,
}

impl ObserverBus {
    /// Creates a bus buffering up to `capacity` unread batches per subscriber.
    pub fn with_capacity(capacity: usize) -> Result<Self, BusError> {
        if capacity == 0 {
            return Err(BusError::InvalidCapacity);
        }
        Ok(Self {
            inner: Arc::new(InnerBus {
                subscribers: RwLock::new(Vec::new()),
                capacity,
                next_id: AtomicU64::new(1),
                next_sequence: AtomicU64::new(1),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Registers a new subscriber. It only sees batches published afterwards.
    pub fn subscribe(&self) -> Subscription {
        let slot = Arc::new(Slot {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            queue: ArrayQueue::new(self.inner.capacity),
            active: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
            notify: Notify::new(),
        });
        self.inner.subscribers.write().push(Arc::clone(&slot));
        debug!(subscriber = slot.id, "Subscriber registered");
        Subscription { slot }
    }

    /// Stops delivery to `subscription` and discards its unread batches.
    /// Returns `false` if it was already unsubscribed.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let was_active = subscription.slot.close();
        self.inner
            .subscribers
            .write()
            .retain(|slot| slot.id != subscription.slot.id);
        if was_active {
            debug!(subscriber = subscription.slot.id, "Subscriber removed");
        }
        was_active
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .iter()
            .filter(|slot| slot.active.load(Ordering::Acquire))
            .count()
    }

    /// Assigns the next sequence number and queues the batch for every live
    /// subscriber. Never blocks on consumers.
    pub fn publish(&self, mut batch: EventBatch) -> PublishReport {
        let sequence = self.inner.next_sequence.fetch_add(1, Ordering::Relaxed);
        batch.sequence = sequence;
        let batch = Arc::new(batch);

        let mut report = PublishReport {
            sequence,
            ..PublishReport::default()
        };
        let mut saw_closed = false;
        {
            let subscribers = self.inner.subscribers.read();
            for slot in subscribers.iter() {
                if !slot.active.load(Ordering::Acquire) {
                    saw_closed = true;
                    continue;
                }
                if let Some(displaced) = slot.queue.force_push(Arc::clone(&batch)) {
                    slot.dropped.fetch_add(1, Ordering::Relaxed);
                    report.dropped += 1;
                    warn!(
                        subscriber = slot.id,
                        dropped_sequence = displaced.sequence,
                        capacity = self.inner.capacity,
                        "Subscriber lagging, dropped oldest unread batch"
                    );
                }
                report.delivered += 1;
                slot.notify.notify_one();
            }
        }
        if saw_closed {
            self.inner
                .subscribers
                .write()
                .retain(|slot| slot.active.load(Ordering::Acquire));
        }
        report
    }
}

/// Receiving end of a subscription. Dropping it ends delivery.
pub struct Subscription {
    slot: Arc<Slot>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.slot.id
    }

    pub fn is_active(&self) -> bool {
        self.slot.active.load(Ordering::Acquire)
    }

    /// Batches displaced from this subscriber's buffer so far.
    pub fn dropped(&self) -> u64 {
        self.slot.dropped.load(Ordering::Relaxed)
    }

    /// Unread batches currently buffered.
    pub fn pending(&self) -> usize {
        self.slot.queue.len()
    }

    /// Returns the next buffered batch without waiting.
    pub fn try_recv(&self) -> Option<Arc<EventBatch>> {
        if !self.is_active() {
            return None;
        }
        self.slot.queue.pop()
    }

    /// Takes every buffered batch in publication order.
    pub fn drain(&self) -> Vec<Arc<EventBatch>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Waits for the next batch. Resolves to `None` once unsubscribed.
    pub async fn recv(&self) -> Option<Arc<EventBatch>> {
        loop {
            if !self.is_active() {
                return None;
            }
            if let Some(batch) = self.slot.queue.pop() {
                return Some(batch);
            }
            self.slot.notify.notified().await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.slot.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.slot.id)
            .field("active", &self.is_active())
            .field("pending", &self.pending())
            .finish()
    }
}
