//! # Event Bus (C1)
//!
//! Typed pub/sub with bounded per-subscriber buffers. There is no dispatcher task: every
//! `publish` call enqueues directly from the calling (publisher) thread into each matching
//! subscriber's channel, so publish latency is bounded by channel operations alone, never
//! by another subscriber's processing speed.
//!
//! Two publish modes:
//! - [`EventBus::publish`] is non-blocking: a full subscriber queue is dropped for that
//!   subscriber only, and its drop counter is incremented. Never blocks the publisher.
//! - [`EventBus::publish_blocking`] awaits space in every subscriber's queue, honouring
//!   cooperative cancellation. Reserved for system-status events per spec.

use crate::event::{Event, EventKind};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default bounded-queue depth applied uniformly across subscribers (spec §4.1).
pub const DEFAULT_BUFFER_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("event bus is closed")]
    ChannelClosed,
    #[error("publish cancelled before all subscribers accepted the event")]
    Cancelled,
}

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

/// A subscriber's handle to its event stream. Dropping it implicitly stops further
/// delivery attempts from filling its buffer (the sender side will start returning
/// `Closed`, which `publish` treats the same as a successful, non-blocking no-op).
pub struct Subscription {
    pub id: SubscriberId,
    pub kind: EventKind,
    rx: mpsc::Receiver<Event>,
    dropped: Arc<AtomicU64>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Number of events dropped for this subscriber due to a full buffer.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct BusMetrics {
    dropped_by_kind: RwLock<HashMap<EventKind, u64>>,
}

impl BusMetrics {
    fn record_drop(&self, kind: EventKind) {
        *self.dropped_by_kind.write().entry(kind).or_insert(0) += 1;
    }

    fn dropped_for(&self, kind: EventKind) -> u64 {
        self.dropped_by_kind.read().get(&kind).copied().unwrap_or(0)
    }
}

/// The in-process event bus. Cheap to clone (wrap in `Arc`) and safe to share across
/// every long-lived task in the system.
#[derive(Debug)]
pub struct EventBus {
    subscribers: RwLock<HashMap<EventKind, Vec<Subscriber>>>,
    buffer_size: usize,
    next_id: AtomicU64,
    closed: std::sync::atomic::AtomicBool,
    metrics: BusMetrics,
}

impl std::fmt::Debug for BusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusMetrics").finish()
    }
}

impl EventBus {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            buffer_size,
            next_id: AtomicU64::new(0),
            closed: std::sync::atomic::AtomicBool::new(false),
            metrics: BusMetrics::default(),
        }
    }

    /// Subscribes to a single event kind. Fails with [`BusError::ChannelClosed`] if the
    /// bus was already [`EventBus::close`]d.
    pub fn subscribe(&self, kind: EventKind) -> Result<Subscription, BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::ChannelClosed);
        }
        let (tx, rx) = mpsc::channel(self.buffer_size);
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let dropped = Arc::new(AtomicU64::new(0));
        self.subscribers
            .write()
            .entry(kind)
            .or_default()
            .push(Subscriber {
                id,
                tx,
                dropped: dropped.clone(),
            });
        Ok(Subscription {
            id,
            kind,
            rx,
            dropped,
        })
    }

    pub fn unsubscribe(&self, kind: EventKind, id: SubscriberId) {
        if let Some(list) = self.subscribers.write().get_mut(&kind) {
            list.retain(|s| s.id != id);
        }
    }

    /// Non-blocking publish. For each subscriber of `event.kind()`, attempts to enqueue;
    /// a full queue is dropped for that subscriber only. Never blocks the publisher.
    pub fn publish(&self, event: Event) {
        let kind = event.kind();
        let subscribers = self.subscribers.read();
        let Some(list) = subscribers.get(&kind) else {
            return;
        };
        for subscriber in list {
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    subscriber.dropped.fetch_add(1, Ordering::Relaxed);
                    self.metrics.record_drop(kind);
                    tracing::debug!(?kind, subscriber = subscriber.id.0, "bus buffer full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // subscriber gone; next unsubscribe/subscribe cycle will prune it.
                }
            }
        }
    }

    /// Blocking publish with cooperative cancellation. Enqueues to every subscriber in
    /// turn, awaiting space. Used for system-status events per spec.
    pub async fn publish_blocking(
        &self,
        event: Event,
        cancel: &CancellationToken,
    ) -> Result<(), BusError> {
        let kind = event.kind();
        let senders: Vec<mpsc::Sender<Event>> = {
            let subscribers = self.subscribers.read();
            subscribers
                .get(&kind)
                .map(|list| list.iter().map(|s| s.tx.clone()).collect())
                .unwrap_or_default()
        };
        for tx in senders {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BusError::Cancelled),
                res = tx.send(event.clone()) => {
                    // A closed receiver is not a cancellation; just move on.
                    let _ = res;
                }
            }
        }
        Ok(())
    }

    /// Total events dropped for `kind` across all subscribers, for metrics/testing.
    pub fn dropped_count(&self, kind: EventKind) -> u64 {
        self.metrics.dropped_for(kind)
    }

    /// Closes the bus: no further `subscribe` calls succeed, and existing subscriptions
    /// are dropped (their channels close, so pending `recv`s return `None`).
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.subscribers.write().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ComponentStatus, SystemStatusEvent};
    use chrono::Utc;

    fn status_event(message: &str) -> Event {
        Event::system_status(
            Utc::now(),
            SystemStatusEvent {
                component: "test".into(),
                status: ComponentStatus::Running,
                message: message.into(),
            },
        )
    }

    #[tokio::test]
    async fn per_subscriber_fifo() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe(EventKind::SystemStatus).unwrap();
        bus.publish(status_event("first"));
        bus.publish(status_event("second"));

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert_eq!(first.payload, status_event("first").payload);
        assert_eq!(second.payload, status_event("second").payload);
    }

    #[tokio::test]
    async fn slow_subscriber_never_blocks_publisher_and_others_receive_all() {
        let bus = Arc::new(EventBus::new(4));
        let slow = bus.subscribe(EventKind::SystemStatus).unwrap();
        let mut fast = bus.subscribe(EventKind::SystemStatus).unwrap();

        // `fast` is drained concurrently so its buffer never fills, while `slow` is
        // never read and is expected to drop everything past its buffer depth.
        let drain = tokio::spawn(async move {
            let mut received = Vec::new();
            while let Some(event) = fast.recv().await {
                received.push(event);
                if received.len() == 10 * 4 {
                    break;
                }
            }
            received
        });

        for i in 0..(10 * 4) {
            bus.publish(status_event(&format!("evt-{i}")));
            tokio::task::yield_now().await;
        }

        let received = tokio::time::timeout(std::time::Duration::from_secs(1), drain)
            .await
            .expect("drain task timed out")
            .unwrap();
        assert_eq!(received.len(), 10 * 4);
        assert_eq!(slow.dropped_count(), 10 * 4 - 4);
    }

    #[tokio::test]
    async fn subscribe_after_close_fails() {
        let bus = EventBus::new(8);
        bus.close();
        assert_eq!(
            bus.subscribe(EventKind::MarketData).unwrap_err(),
            BusError::ChannelClosed
        );
    }

    #[tokio::test]
    async fn publish_blocking_honours_cancellation() {
        let bus = EventBus::new(1);
        let _sub = bus.subscribe(EventKind::SystemStatus).unwrap();
        // fill the single slot
        bus.publish(status_event("fills-the-slot"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = bus.publish_blocking(status_event("blocked"), &cancel).await;
        assert_eq!(result.unwrap_err(), BusError::Cancelled);
    }
}
