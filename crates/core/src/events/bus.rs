//! In-process at-least-once event transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Delivery, EventBusError, UploadConfirmedEvent};

/// Create a bounded event bus.
///
/// The publisher is cheap to clone. The subscription is shared by every
/// worker; each delivery goes to exactly one of them.
pub fn create_event_bus(capacity: usize) -> (EventPublisher, EventSubscription) {
    let (tx, rx) = mpsc::channel(capacity);
    let subscription = EventSubscription {
        rx: Arc::new(Mutex::new(rx)),
        redeliver_tx: tx.downgrade(),
    };
    (EventPublisher { tx }, subscription)
}

/// Publishing side of the bus.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<Delivery>,
}

impl EventPublisher {
    /// Publish an event, waiting for queue space. Returns the message id.
    pub async fn publish(&self, event: UploadConfirmedEvent) -> Result<String, EventBusError> {
        event.validate()?;
        let delivery = Delivery::first(event);
        let message_id = delivery.message_id.clone();
        self.tx
            .send(delivery)
            .await
            .map_err(|_| EventBusError::Closed)?;
        debug!(message_id = %message_id, "Published upload-confirmed event");
        Ok(message_id)
    }

    /// Publish without waiting; fails with `QueueFull` when the queue is at capacity.
    pub fn try_publish(&self, event: UploadConfirmedEvent) -> Result<String, EventBusError> {
        event.validate()?;
        let delivery = Delivery::first(event);
        let message_id = delivery.message_id.clone();
        self.tx.try_send(delivery).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EventBusError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => EventBusError::Closed,
        })?;
        Ok(message_id)
    }

    /// Number of deliveries waiting to be picked up.
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Consuming side of the bus.
///
/// The subscription only holds a weak sender for redelivery, so the queue
/// closes once every [`EventPublisher`] is dropped.
#[derive(Clone)]
pub struct EventSubscription {
    rx: Arc<Mutex<mpsc::Receiver<Delivery>>>,
    redeliver_tx: mpsc::WeakSender<Delivery>,
}

impl EventSubscription {
    /// Wait for the next delivery. Returns `None` on shutdown or when the bus is closed.
    pub async fn next(&self, shutdown: &CancellationToken) -> Option<Delivery> {
        let mut rx = tokio::select! {
            guard = self.rx.lock() => guard,
            _ = shutdown.cancelled() => return None,
        };
        tokio::select! {
            delivery = rx.recv() => delivery,
            _ = shutdown.cancelled() => None,
        }
    }

    /// Put a delivery back on the queue as its next attempt.
    pub async fn redeliver(&self, delivery: Delivery) -> Result<(), EventBusError> {
        let tx = self.redeliver_tx.upgrade().ok_or(EventBusError::Closed)?;
        tx.send(delivery.next_attempt())
            .await
            .map_err(|_| EventBusError::Closed)
    }

    /// Redeliver after `delay` in the background. Dropped if `shutdown` fires first.
    pub fn redeliver_after(
        &self,
        delivery: Delivery,
        delay: Duration,
        shutdown: CancellationToken,
    ) {
        let subscription = self.clone();
        tokio::spawn(async move {
            let message_id = delivery.message_id.clone();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    warn!(message_id = %message_id, "Shutdown before redelivery, dropping delivery");
                    return;
                }
            }
            if let Err(e) = subscription.redeliver(delivery).await {
                warn!(message_id = %message_id, error = %e, "Redelivery failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> UploadConfirmedEvent {
        UploadConfirmedEvent::new(id, format!("original/1/{}/a.mov", id), 1)
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let (publisher, subscription) = create_event_bus(10);
        let shutdown = CancellationToken::new();

        let id = publisher.publish(event("m1")).await.unwrap();
        let delivery = subscription.next(&shutdown).await.unwrap();

        assert_eq!(delivery.message_id, id);
        assert_eq!(delivery.event.media_id, "m1");
        assert_eq!(delivery.attempt, 1);
    }

    #[tokio::test]
    async fn test_publish_rejects_invalid_event() {
        let (publisher, _subscription) = create_event_bus(10);
        let result = publisher
            .publish(UploadConfirmedEvent::new("", "original/1/x/a.mov", 1))
            .await;
        assert!(matches!(result, Err(EventBusError::InvalidEvent(_))));
    }

    #[tokio::test]
    async fn test_try_publish_full_queue() {
        let (publisher, _subscription) = create_event_bus(1);
        publisher.try_publish(event("m1")).unwrap();
        assert_eq!(publisher.queued(), 1);
        assert!(matches!(
            publisher.try_publish(event("m2")),
            Err(EventBusError::QueueFull)
        ));
    }

    #[tokio::test]
    async fn test_redeliver_bumps_attempt() {
        let (publisher, subscription) = create_event_bus(10);
        let shutdown = CancellationToken::new();

        publisher.publish(event("m1")).await.unwrap();
        let first = subscription.next(&shutdown).await.unwrap();
        subscription.redeliver(first.clone()).await.unwrap();

        let second = subscription.next(&shutdown).await.unwrap();
        assert_eq!(second.message_id, first.message_id);
        assert_eq!(second.attempt, 2);
    }

    #[tokio::test]
    async fn test_redeliver_after_delay() {
        let (publisher, subscription) = create_event_bus(10);
        let shutdown = CancellationToken::new();

        publisher.publish(event("m1")).await.unwrap();
        let first = subscription.next(&shutdown).await.unwrap();
        subscription.redeliver_after(first, Duration::from_millis(20), shutdown.clone());

        let second = tokio::time::timeout(Duration::from_secs(5), subscription.next(&shutdown))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.attempt, 2);
    }

    #[tokio::test]
    async fn test_next_returns_none_on_shutdown() {
        let (_publisher, subscription) = create_event_bus(10);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        assert!(subscription.next(&shutdown).await.is_none());
    }

    #[tokio::test]
    async fn test_closed_when_publishers_dropped() {
        let (publisher, subscription) = create_event_bus(10);
        drop(publisher);
        assert!(subscription.next(&CancellationToken::new()).await.is_none());
    }
}
