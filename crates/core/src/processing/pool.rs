//! Workers that pull deliveries off the event bus and run the processor.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::{Delivery, EventSubscription};
use crate::metrics;

use super::{HandleOutcome, MediaProcessor, ProcessingError, WorkerConfig};

/// Snapshot of the pool's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerPoolStatus {
    pub workers: usize,
    pub in_flight: usize,
    pub processed: u64,
    pub already_handled: u64,
    pub failed: u64,
    pub redelivered: u64,
    pub dead_lettered: u64,
}

#[derive(Default)]
struct Counters {
    in_flight: AtomicUsize,
    processed: AtomicU64,
    already_handled: AtomicU64,
    failed: AtomicU64,
    redelivered: AtomicU64,
    dead_lettered: AtomicU64,
}

struct WorkerContext {
    processor: Arc<MediaProcessor>,
    subscription: EventSubscription,
    config: WorkerConfig,
    counters: Counters,
}

/// A fixed set of worker tasks sharing one subscription.
pub struct WorkerPool {
    context: Arc<WorkerContext>,
    workers: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Start `config.workers` workers. They stop taking deliveries once
    /// `shutdown` fires, and in-flight deliveries are cancelled.
    pub fn spawn(
        processor: Arc<MediaProcessor>,
        subscription: EventSubscription,
        config: WorkerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let workers = config.workers.max(1);
        let context = Arc::new(WorkerContext {
            processor,
            subscription,
            config,
            counters: Counters::default(),
        });

        let handles = (0..workers)
            .map(|worker| {
                let context = Arc::clone(&context);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { context.run(worker, shutdown).await })
            })
            .collect();

        info!(workers, "Worker pool started");
        Self {
            context,
            workers,
            handles: Mutex::new(handles),
        }
    }

    pub fn status(&self) -> WorkerPoolStatus {
        let c = &self.context.counters;
        WorkerPoolStatus {
            workers: self.workers,
            in_flight: c.in_flight.load(Ordering::Relaxed),
            processed: c.processed.load(Ordering::Relaxed),
            already_handled: c.already_handled.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            redelivered: c.redelivered.load(Ordering::Relaxed),
            dead_lettered: c.dead_lettered.load(Ordering::Relaxed),
        }
    }

    /// Wait for every worker to exit. Later calls return immediately.
    pub async fn join(&self) {
        let handles = {
            let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task panicked");
            }
        }
        info!("Worker pool stopped");
    }
}

impl WorkerContext {
    async fn run(&self, worker: usize, shutdown: CancellationToken) {
        debug!(worker, "Worker started");
        while let Some(delivery) = self.subscription.next(&shutdown).await {
            self.process(worker, delivery, &shutdown).await;
        }
        debug!(worker, "Worker stopped");
    }

    async fn process(&self, worker: usize, delivery: Delivery, shutdown: &CancellationToken) {
        let cancel = shutdown.child_token();
        self.counters.in_flight.fetch_add(1, Ordering::Relaxed);
        metrics::DELIVERIES_IN_FLIGHT.inc();

        debug!(
            worker,
            message_id = %delivery.message_id,
            media_id = %delivery.event.media_id,
            attempt = delivery.attempt,
            "Handling delivery"
        );

        // On deadline the delivery is cancelled rather than dropped, so the
        // handler still records the failure on both stores.
        let (result, timed_out) = {
            let handle = self.processor.handle(&delivery.event, &cancel);
            tokio::pin!(handle);

            match tokio::time::timeout(self.config.ack_deadline(), &mut handle).await {
                Ok(result) => (result, false),
                Err(_) => {
                    warn!(
                        message_id = %delivery.message_id,
                        media_id = %delivery.event.media_id,
                        deadline_secs = self.config.ack_deadline_secs,
                        "Ack deadline exceeded, cancelling delivery"
                    );
                    cancel.cancel();
                    (handle.await, true)
                }
            }
        };

        self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
        metrics::DELIVERIES_IN_FLIGHT.dec();

        match result {
            Ok(HandleOutcome::Ready { .. }) => {
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                metrics::DELIVERIES_TOTAL
                    .with_label_values(&["processed"])
                    .inc();
            }
            Ok(HandleOutcome::AlreadyHandled { .. }) => {
                self.counters.already_handled.fetch_add(1, Ordering::Relaxed);
                metrics::DELIVERIES_TOTAL
                    .with_label_values(&["already_handled"])
                    .inc();
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                let label = if timed_out { "timed_out" } else { "failed" };
                metrics::DELIVERIES_TOTAL.with_label_values(&[label]).inc();
                self.nack(delivery, &e, shutdown);
            }
        }
    }

    /// Redeliver with backoff or give up on the delivery.
    fn nack(&self, delivery: Delivery, err: &ProcessingError, shutdown: &CancellationToken) {
        if shutdown.is_cancelled() {
            warn!(
                message_id = %delivery.message_id,
                media_id = %delivery.event.media_id,
                "Delivery interrupted by shutdown"
            );
            return;
        }

        if err.is_retryable() && delivery.attempt < self.config.max_delivery_attempts {
            let delay = self.config.redelivery_backoff(delivery.attempt);
            warn!(
                message_id = %delivery.message_id,
                media_id = %delivery.event.media_id,
                attempt = delivery.attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Delivery failed, scheduling redelivery"
            );
            self.counters.redelivered.fetch_add(1, Ordering::Relaxed);
            metrics::REDELIVERIES_TOTAL.inc();
            self.subscription
                .redeliver_after(delivery, delay, shutdown.clone());
        } else {
            error!(
                message_id = %delivery.message_id,
                media_id = %delivery.event.media_id,
                attempt = delivery.attempt,
                retryable = err.is_retryable(),
                error = %err,
                "Dead-lettering delivery"
            );
            self.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
            metrics::DEAD_LETTERS_TOTAL.inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{create_event_bus, UploadConfirmedEvent};
    use crate::job::{JobStore, SqliteJobStore};
    use crate::media::{MediaStatus, MediaStore, NewMediaItem, SqliteMediaStore};
    use crate::stage::{ObjectStage, StorageBackend};
    use crate::testing::MockCodec;
    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use object_store::{ObjectStore, PutOptions, PutPayload};
    use std::time::Duration;

    struct Harness {
        media: Arc<SqliteMediaStore>,
        jobs: Arc<SqliteJobStore>,
        codec: Arc<MockCodec>,
        processor: Arc<MediaProcessor>,
    }

    async fn harness(ids: &[&str]) -> Harness {
        let media = Arc::new(SqliteMediaStore::in_memory().unwrap());
        let jobs = Arc::new(SqliteJobStore::in_memory().unwrap());
        let codec = Arc::new(MockCodec::new());
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());

        for id in ids {
            let key = format!("original/1/{}/clip.mov", id);
            media.insert(NewMediaItem::queued(*id, 1, &key)).unwrap();
            store
                .put_opts(
                    &ObjectPath::parse(&key).unwrap(),
                    PutPayload::from_static(b"bytes"),
                    PutOptions::default(),
                )
                .await
                .unwrap();
        }

        let processor = Arc::new(MediaProcessor::new(
            media.clone(),
            jobs.clone(),
            ObjectStage::new(store, StorageBackend::Memory),
            codec.clone(),
        ));

        Harness {
            media,
            jobs,
            codec,
            processor,
        }
    }

    fn event(id: &str) -> UploadConfirmedEvent {
        UploadConfirmedEvent::new(id, format!("original/1/{}/clip.mov", id), 1)
    }

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            workers: 2,
            redelivery_backoff_base_ms: 10,
            redelivery_backoff_max_ms: 50,
            ..Default::default()
        }
    }

    async fn wait_for<F: Fn() -> bool>(check: F) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_pool_processes_events() {
        let h = harness(&["a", "b", "c"]).await;
        let (publisher, subscription) = create_event_bus(10);
        let shutdown = CancellationToken::new();
        let pool = WorkerPool::spawn(h.processor.clone(), subscription, fast_config(), shutdown.clone());

        for id in ["a", "b", "c"] {
            publisher.publish(event(id)).await.unwrap();
        }

        wait_for(|| pool.status().processed == 3).await;
        for id in ["a", "b", "c"] {
            assert_eq!(h.media.get(id).unwrap().unwrap().status, MediaStatus::Ready);
        }
        assert_eq!(pool.status().workers, 2);

        shutdown.cancel();
        pool.join().await;
    }

    #[tokio::test]
    async fn test_duplicate_deliveries_processed_once() {
        let h = harness(&["m1"]).await;
        let (publisher, subscription) = create_event_bus(10);
        let shutdown = CancellationToken::new();
        let pool = WorkerPool::spawn(
            h.processor.clone(),
            subscription,
            WorkerConfig {
                workers: 4,
                ..fast_config()
            },
            shutdown.clone(),
        );

        for _ in 0..4 {
            publisher.publish(event("m1")).await.unwrap();
        }

        wait_for(|| {
            let s = pool.status();
            s.processed + s.already_handled == 4
        })
        .await;

        assert_eq!(pool.status().processed, 1);
        assert_eq!(h.codec.transcode_calls(), 1);
        assert_eq!(h.jobs.list_for_media("m1").unwrap().len(), 1);

        shutdown.cancel();
        pool.join().await;
    }

    #[tokio::test]
    async fn test_retryable_failure_is_redelivered() {
        let h = harness(&["m1"]).await;
        h.codec.fail_next(1, "transient encoder crash");
        let (publisher, subscription) = create_event_bus(10);
        let shutdown = CancellationToken::new();
        let pool = WorkerPool::spawn(h.processor.clone(), subscription, fast_config(), shutdown.clone());

        publisher.publish(event("m1")).await.unwrap();

        wait_for(|| pool.status().processed == 1).await;
        let status = pool.status();
        assert_eq!(status.failed, 1);
        assert_eq!(status.redelivered, 1);
        assert_eq!(h.media.get("m1").unwrap().unwrap().status, MediaStatus::Ready);

        shutdown.cancel();
        pool.join().await;
    }

    #[tokio::test]
    async fn test_exhausted_attempts_dead_letter() {
        let h = harness(&["m1"]).await;
        h.codec.fail_with("always broken");
        let (publisher, subscription) = create_event_bus(10);
        let shutdown = CancellationToken::new();
        let pool = WorkerPool::spawn(
            h.processor.clone(),
            subscription,
            WorkerConfig {
                max_delivery_attempts: 2,
                ..fast_config()
            },
            shutdown.clone(),
        );

        publisher.publish(event("m1")).await.unwrap();

        wait_for(|| pool.status().dead_lettered == 1).await;
        assert_eq!(h.codec.transcode_calls(), 2);
        assert_eq!(h.media.get("m1").unwrap().unwrap().status, MediaStatus::Failed);

        shutdown.cancel();
        pool.join().await;
    }

    #[tokio::test]
    async fn test_unknown_media_dead_letters_immediately() {
        let h = harness(&[]).await;
        let (publisher, subscription) = create_event_bus(10);
        let shutdown = CancellationToken::new();
        let pool = WorkerPool::spawn(h.processor.clone(), subscription, fast_config(), shutdown.clone());

        publisher.publish(event("ghost")).await.unwrap();

        wait_for(|| pool.status().dead_lettered == 1).await;
        assert_eq!(pool.status().redelivered, 0);

        shutdown.cancel();
        pool.join().await;
    }

    #[tokio::test]
    async fn test_ack_deadline_cancels_and_fails() {
        let h = harness(&["m1"]).await;
        h.codec.hang();
        let (publisher, subscription) = create_event_bus(10);
        let shutdown = CancellationToken::new();
        let pool = WorkerPool::spawn(
            h.processor.clone(),
            subscription,
            WorkerConfig {
                ack_deadline_secs: 1,
                max_delivery_attempts: 1,
                ..fast_config()
            },
            shutdown.clone(),
        );

        publisher.publish(event("m1")).await.unwrap();

        wait_for(|| pool.status().dead_lettered == 1).await;
        assert_eq!(h.media.get("m1").unwrap().unwrap().status, MediaStatus::Failed);
        assert_eq!(pool.status().in_flight, 0);

        shutdown.cancel();
        pool.join().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_workers() {
        let h = harness(&[]).await;
        let (_publisher, subscription) = create_event_bus(10);
        let shutdown = CancellationToken::new();
        let pool = WorkerPool::spawn(h.processor.clone(), subscription, fast_config(), shutdown.clone());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), pool.join())
            .await
            .expect("workers did not stop");
    }
}
