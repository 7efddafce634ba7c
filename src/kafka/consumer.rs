//! Kafka consumer-group side of the large-transfer pipeline.
//!
//! Each worker is its own group member driving an independent consume loop;
//! the group protocol rebalances partitions across them. Offsets are
//! committed manually, and only after the store accepted the message, so a
//! failed store write leads to redelivery.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::Message;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::NotifierConfig;
use crate::notifier::store::{handle_payload, NotificationStore};

pub struct NotificationConsumer {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl NotificationConsumer {
    /// Spawns one consumer-group member per configured worker.
    pub fn start(
        config: &NotifierConfig,
        store: Arc<dyn NotificationStore>,
    ) -> Result<Self, KafkaError> {
        let (shutdown_tx, _) = watch::channel(false);
        let mut handles = Vec::with_capacity(config.workers);

        for worker_id in 0..config.workers {
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &config.brokers)
                .set("group.id", &config.group_id)
                .set("partition.assignment.strategy", "roundrobin")
                .set("auto.offset.reset", "earliest")
                .set("enable.auto.commit", "false")
                .create()?;
            consumer.subscribe(&[config.topic.as_str()])?;

            let store = Arc::clone(&store);
            let shutdown_rx = shutdown_tx.subscribe();
            handles.push(tokio::spawn(consume_loop(
                worker_id,
                consumer,
                store,
                shutdown_rx,
            )));
        }

        tracing::info!(
            group_id = %config.group_id,
            topic = %config.topic,
            workers = config.workers,
            "kafka consumer started"
        );

        Ok(Self {
            handles,
            shutdown_tx,
        })
    }

    /// Stops the consume loops (triggering a group rebalance) and waits for
    /// the workers, bounded by `deadline`.
    pub async fn shutdown(self, deadline: Duration) {
        let _ = self.shutdown_tx.send(true);

        let drain = async {
            for handle in self.handles {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(deadline, drain).await.is_err() {
            tracing::warn!("consumer workers did not stop within the shutdown deadline");
        } else {
            tracing::info!("kafka consumer closed");
        }
    }
}

async fn consume_loop(
    worker_id: usize,
    consumer: StreamConsumer,
    store: Arc<dyn NotificationStore>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::info!(worker_id, "consumer worker started");

    loop {
        let message = tokio::select! {
            _ = shutdown_rx.changed() => break,
            message = consumer.recv() => message,
        };

        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(worker_id, error = %err, "consume error");
                continue;
            }
        };

        let payload = message.payload().unwrap_or_default();
        match handle_payload(payload, store.as_ref()).await {
            Ok(()) => {
                if let Err(err) = consumer.commit_message(&message, CommitMode::Async) {
                    tracing::error!(
                        worker_id,
                        offset = message.offset(),
                        error = %err,
                        "failed to commit offset"
                    );
                }
            }
            Err(err) => {
                // No commit: the message will be redelivered.
                tracing::error!(
                    worker_id,
                    partition = message.partition(),
                    offset = message.offset(),
                    error = %err,
                    "notification not stored, message will be redelivered"
                );
            }
        }
    }

    tracing::info!(worker_id, "consumer worker stopped");
}
