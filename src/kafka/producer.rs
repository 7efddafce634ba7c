//! Kafka publisher for large-transfer events.
//!
//! Messages are keyed by transaction id so deliveries for one transaction
//! land on one partition in order. Delivery requires acks from all in-sync
//! replicas, retries up to five times with snappy compression, and gives up
//! after the five-second send deadline.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use crate::models::event::LargeTransferEvent;
use crate::services::events::{PublishError, TransferEventPublisher};

const SEND_DEADLINE: Duration = Duration::from_secs(5);

pub struct KafkaTransferPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaTransferPublisher {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("message.send.max.retries", "5")
            .set("compression.type", "snappy")
            .set("message.timeout.ms", "5000")
            .create()?;

        tracing::info!(brokers, topic, "kafka producer created");

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl TransferEventPublisher for KafkaTransferPublisher {
    async fn publish(&self, event: &LargeTransferEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;

        let record = FutureRecord::to(&self.topic)
            .key(&event.transaction_id)
            .payload(&payload);

        self.producer
            .send(record, Timeout::After(SEND_DEADLINE))
            .await
            .map_err(|(err, _)| PublishError::Delivery(err.to_string()))?;

        tracing::debug!(
            transaction_id = %event.transaction_id,
            "event delivered to kafka"
        );
        Ok(())
    }

    async fn close(&self) {
        tracing::info!("closing kafka producer");
        if let Err(err) = self.producer.flush(Timeout::After(SEND_DEADLINE)) {
            tracing::warn!(error = %err, "kafka producer flush failed");
        }
    }
}

/// Stand-in used when event publishing is disabled by configuration;
/// events are dropped with a debug log.
pub struct DisabledTransferPublisher;

#[async_trait]
impl TransferEventPublisher for DisabledTransferPublisher {
    async fn publish(&self, event: &LargeTransferEvent) -> Result<(), PublishError> {
        tracing::debug!(
            transaction_id = %event.transaction_id,
            "event publishing disabled, event dropped"
        );
        Ok(())
    }
}
