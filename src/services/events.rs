//! Large-transfer event pipeline, producer side.
//!
//! A process-wide bounded queue decouples the exchange commit path from the
//! durable log. Enqueueing never blocks: when the queue is full the event is
//! dropped with an error log and the user-visible operation still succeeds.
//! A fixed pool of workers drains the queue and publishes with a deadline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::models::event::LargeTransferEvent;

pub const EVENT_QUEUE_CAPACITY: usize = 100;
pub const EVENT_WORKER_COUNT: usize = 5;

/// Deadline for a single publish attempt, independent of the request
/// context that produced the event.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to deliver event: {0}")]
    Delivery(String),
}

/// Destination for large-transfer events (the durable log, or a disabled
/// stand-in when event publishing is turned off).
#[async_trait]
pub trait TransferEventPublisher: Send + Sync {
    async fn publish(&self, event: &LargeTransferEvent) -> Result<(), PublishError>;

    /// Flush and release any underlying resources on shutdown.
    async fn close(&self) {}
}

/// Cloneable producer handle for the bounded event queue.
#[derive(Clone)]
pub struct TransferEventQueue {
    tx: mpsc::Sender<LargeTransferEvent>,
}

impl TransferEventQueue {
    /// Non-blocking enqueue. A full queue drops the event; overflow is an
    /// operational alarm, not a transaction failure.
    pub fn enqueue(&self, event: LargeTransferEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::error!(
                    transaction_id = %event.transaction_id,
                    amount = event.amount,
                    "event queue full, large transfer event dropped"
                );
            }
            Err(TrySendError::Closed(event)) => {
                tracing::error!(
                    transaction_id = %event.transaction_id,
                    "event workers are stopped, large transfer event dropped"
                );
            }
        }
    }
}

/// Owns the worker tasks draining the queue.
pub struct TransferEventDispatcher {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl TransferEventDispatcher {
    /// Signals the workers to stop and waits for all of them to return,
    /// bounded by `deadline`.
    pub async fn shutdown(self, deadline: Duration) {
        let _ = self.shutdown_tx.send(true);

        let drain = async {
            for handle in self.handles {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(deadline, drain).await.is_err() {
            tracing::warn!("event workers did not stop within the shutdown deadline");
        } else {
            tracing::info!("all event workers stopped");
        }
    }
}

/// Spawns the worker pool and returns the producer handle plus the
/// dispatcher that joins the workers on shutdown.
pub fn start_event_dispatcher(
    publisher: Arc<dyn TransferEventPublisher>,
    workers: usize,
    capacity: usize,
) -> (TransferEventQueue, TransferEventDispatcher) {
    let (tx, rx) = mpsc::channel(capacity);
    let rx = Arc::new(Mutex::new(rx));
    let (shutdown_tx, _) = watch::channel(false);

    let handles = (0..workers)
        .map(|worker_id| {
            let rx = Arc::clone(&rx);
            let publisher = Arc::clone(&publisher);
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(worker_loop(worker_id, rx, publisher, shutdown_rx))
        })
        .collect();

    (
        TransferEventQueue { tx },
        TransferEventDispatcher {
            handles,
            shutdown_tx,
        },
    )
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<LargeTransferEvent>>>,
    publisher: Arc<dyn TransferEventPublisher>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::info!(worker_id, "transfer event worker started");

    loop {
        let event = tokio::select! {
            _ = shutdown_rx.changed() => break,
            event = async { rx.lock().await.recv().await } => match event {
                Some(event) => event,
                None => break,
            },
        };

        match tokio::time::timeout(PUBLISH_TIMEOUT, publisher.publish(&event)).await {
            Ok(Ok(())) => {
                tracing::info!(
                    worker_id,
                    transaction_id = %event.transaction_id,
                    "large transfer event published"
                );
            }
            Ok(Err(err)) => {
                tracing::error!(
                    worker_id,
                    transaction_id = %event.transaction_id,
                    error = %err,
                    "failed to publish large transfer event"
                );
            }
            Err(_) => {
                tracing::error!(
                    worker_id,
                    transaction_id = %event.transaction_id,
                    "large transfer event publish timed out"
                );
            }
        }
    }

    tracing::info!(worker_id, "transfer event worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Semaphore;
    use uuid::Uuid;

    fn event(id: &str) -> LargeTransferEvent {
        LargeTransferEvent {
            transaction_id: id.to_string(),
            user_id: Uuid::new_v4(),
            from_currency: "USD".to_string(),
            to_currency: "EUR".to_string(),
            amount: 40_000.0,
            exchanged_amount: 36_800.0,
            rate: 0.92,
            timestamp: Utc::now(),
        }
    }

    /// Publisher that parks on a semaphore so tests can control when each
    /// publish completes, and records delivered transaction ids.
    struct GatedPublisher {
        started: mpsc::UnboundedSender<()>,
        gate: Semaphore,
        published: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl TransferEventPublisher for GatedPublisher {
        async fn publish(&self, event: &LargeTransferEvent) -> Result<(), PublishError> {
            let _ = self.started.send(());
            let permit = self.gate.acquire().await.expect("gate closed");
            permit.forget();
            self.published
                .lock()
                .unwrap()
                .push(event.transaction_id.clone());
            Ok(())
        }
    }

    async fn wait_for_published(publisher: &GatedPublisher, count: usize) {
        for _ in 0..200 {
            if publisher.published.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("publisher never reached {count} events");
    }

    #[tokio::test]
    async fn events_flow_through_workers_to_the_publisher() {
        let (started_tx, _started_rx) = mpsc::unbounded_channel();
        let publisher = Arc::new(GatedPublisher {
            started: started_tx,
            gate: Semaphore::new(100),
            published: StdMutex::new(Vec::new()),
        });

        let (queue, dispatcher) = start_event_dispatcher(publisher.clone(), 5, 100);
        for i in 0..10 {
            queue.enqueue(event(&format!("tx-{i}")));
        }

        wait_for_published(&publisher, 10).await;
        dispatcher.shutdown(Duration::from_secs(5)).await;

        let mut published = publisher.published.lock().unwrap().clone();
        published.sort();
        assert_eq!(published.len(), 10);
        assert!(published.contains(&"tx-0".to_string()));
        assert!(published.contains(&"tx-9".to_string()));
    }

    #[tokio::test]
    async fn full_queue_drops_events_without_blocking() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let publisher = Arc::new(GatedPublisher {
            started: started_tx,
            gate: Semaphore::new(0),
            published: StdMutex::new(Vec::new()),
        });

        // One worker, queue capacity one.
        let (queue, dispatcher) = start_event_dispatcher(publisher.clone(), 1, 1);

        // First event is picked up by the worker and parks in publish.
        queue.enqueue(event("held"));
        started_rx.recv().await.expect("worker never started");

        // Second event sits in the queue; the third finds it full and is
        // dropped. Neither call blocks.
        queue.enqueue(event("queued"));
        queue.enqueue(event("dropped"));

        // Let the parked publishes finish.
        publisher.gate.add_permits(2);
        wait_for_published(&publisher, 2).await;

        dispatcher.shutdown(Duration::from_secs(5)).await;

        let published = publisher.published.lock().unwrap().clone();
        assert_eq!(published, vec!["held".to_string(), "queued".to_string()]);
    }

    #[tokio::test]
    async fn shutdown_joins_all_workers() {
        let (started_tx, _started_rx) = mpsc::unbounded_channel();
        let publisher = Arc::new(GatedPublisher {
            started: started_tx,
            gate: Semaphore::new(100),
            published: StdMutex::new(Vec::new()),
        });

        let (_queue, dispatcher) = start_event_dispatcher(publisher, 5, 10);
        // Returns only after every worker task has exited.
        dispatcher.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_is_a_silent_drop() {
        let (started_tx, _started_rx) = mpsc::unbounded_channel();
        let publisher = Arc::new(GatedPublisher {
            started: started_tx,
            gate: Semaphore::new(100),
            published: StdMutex::new(Vec::new()),
        });

        let (queue, dispatcher) = start_event_dispatcher(publisher, 1, 1);
        dispatcher.shutdown(Duration::from_secs(5)).await;

        // Workers are gone; this must not panic or block.
        queue.enqueue(event("late"));
    }
}
