//! Broadcast hub: fans status updates out to connected subscribers.
//!
//! Publishing is non-blocking end to end: updates go through a bounded
//! central queue into per-subscriber bounded inboxes. A full inbox drops
//! that update for that subscriber only; a closed inbox gets the subscriber
//! evicted on the next fan-out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::db::StatusUpdate;

const CENTRAL_QUEUE_CAP: usize = 100;

#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
    tx: mpsc::Sender<StatusUpdate>,
}

struct HubInner {
    subscribers: RwLock<HashMap<u64, mpsc::Sender<StatusUpdate>>>,
    next_id: AtomicU64,
    inbox_cap: usize,
}

impl Hub {
    /// Create the hub and spawn its dispatch task. `inbox_cap` bounds each
    /// subscriber's inbox.
    pub fn new(inbox_cap: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<StatusUpdate>(CENTRAL_QUEUE_CAP);
        let inner = Arc::new(HubInner {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            inbox_cap: inbox_cap.max(1),
        });

        let dispatch = inner.clone();
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                fan_out(&dispatch, update);
            }
        });

        Self { inner, tx }
    }

    /// Register a new subscriber with a bounded inbox.
    pub fn subscribe(&self) -> Subscriber {
        let (tx, rx) = mpsc::channel(self.inner.inbox_cap);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().unwrap().insert(id, tx);
        tracing::debug!(subscriber = id, "subscriber attached");
        Subscriber { id, rx }
    }

    /// Enqueue an update for every subscriber. Never blocks the caller; a
    /// full central queue drops the update.
    pub fn publish(&self, update: StatusUpdate) {
        if let Err(TrySendError::Full(update)) = self.tx.try_send(update) {
            tracing::warn!(
                service_id = update.service_id,
                "broadcast queue full, dropping update"
            );
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().unwrap().len()
    }
}

fn fan_out(inner: &HubInner, update: StatusUpdate) {
    let mut closed = Vec::new();
    {
        let subscribers = inner.subscribers.read().unwrap();
        for (id, tx) in subscribers.iter() {
            match tx.try_send(update.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscriber = id,
                        service_id = update.service_id,
                        "subscriber inbox full, dropping update"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }
    }
    if !closed.is_empty() {
        let mut subscribers = inner.subscribers.write().unwrap();
        for id in closed {
            subscribers.remove(&id);
            tracing::debug!(subscriber = id, "evicted closed subscriber");
        }
    }
}

/// A bounded inbox attached to one external stream.
pub struct Subscriber {
    id: u64,
    rx: mpsc::Receiver<StatusUpdate>,
}

impl Subscriber {
    /// Next update, in publish order. `None` after `close`, once the inbox
    /// drains.
    pub async fn next(&mut self) -> Option<StatusUpdate> {
        self.rx.recv().await
    }

    /// Detach from the hub; eviction happens on the next fan-out.
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ServiceStatus;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn update(service_id: i64) -> StatusUpdate {
        StatusUpdate {
            service_id,
            status: ServiceStatus::Alive,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let hub = Hub::new(200);
        let mut sub = hub.subscribe();
        for i in 0..100 {
            hub.publish(update(i));
        }
        for i in 0..100 {
            let received = timeout(Duration::from_secs(1), sub.next())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(received.service_id, i);
        }
    }

    #[tokio::test]
    async fn overflow_drops_without_evicting() {
        let hub = Hub::new(2);
        let mut slow = hub.subscribe();
        for i in 0..5 {
            hub.publish(update(i));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hub.subscriber_count(), 1);

        // The first two fit the inbox; the rest were dropped.
        assert_eq!(slow.next().await.unwrap().service_id, 0);
        assert_eq!(slow.next().await.unwrap().service_id, 1);

        // Still subscribed: later publishes arrive.
        hub.publish(update(42));
        let received = timeout(Duration::from_secs(1), slow.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.service_id, 42);
    }

    #[tokio::test]
    async fn closed_subscriber_is_evicted_on_next_publish() {
        let hub = Hub::new(10);
        let mut going = hub.subscribe();
        let mut staying = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        going.close();
        hub.publish(update(1));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hub.subscriber_count(), 1);

        let received = timeout(Duration::from_secs(1), staying.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.service_id, 1);
    }

    #[tokio::test]
    async fn independent_subscribers_each_get_every_update() {
        let hub = Hub::new(10);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        hub.publish(update(7));
        for sub in [&mut a, &mut b] {
            let received = timeout(Duration::from_secs(1), sub.next())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(received.service_id, 7);
        }
    }
}
