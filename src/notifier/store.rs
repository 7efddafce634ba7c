//! Notification persistence seam and the per-message consumer contract.
//!
//! The contract for each consumed message:
//! - malformed payloads are logged and acknowledged (poison pills are not
//!   re-queued);
//! - a stored (or already-stored) notification acknowledges the message;
//! - any other store failure leaves the offset unadvanced so the message is
//!   redelivered.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Serialize};

use crate::models::event::LargeTransferEvent;

/// Document persisted for each consumed large-transfer event. The unique
/// index on `transaction_id` turns redeliveries into no-ops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LargeTransferNotification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,
    pub transaction_id: String,
    pub user_id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub amount: f64,
    pub exchanged_amount: f64,
    pub rate: f64,
    pub timestamp: bson::DateTime,
    pub processed_at: bson::DateTime,
}

impl LargeTransferNotification {
    pub fn from_event(event: LargeTransferEvent, processed_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            transaction_id: event.transaction_id,
            user_id: event.user_id.to_string(),
            from_currency: event.from_currency,
            to_currency: event.to_currency,
            amount: event.amount,
            exchanged_amount: event.exchanged_amount,
            rate: event.rate,
            timestamp: bson::DateTime::from_millis(event.timestamp.timestamp_millis()),
            processed_at: bson::DateTime::from_millis(processed_at.timestamp_millis()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("notification store error: {0}")]
pub struct StoreError(pub String);

/// Durable sink for notifications. Implementations absorb duplicate
/// transaction ids as success.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn save(&self, notification: &LargeTransferNotification) -> Result<(), StoreError>;
}

/// Processes one raw message payload against the store. `Ok(())` means the
/// message may be acknowledged; `Err` means it must be redelivered.
pub async fn handle_payload(
    payload: &[u8],
    store: &dyn NotificationStore,
) -> Result<(), StoreError> {
    let event: LargeTransferEvent = match serde_json::from_slice(payload) {
        Ok(event) => event,
        Err(err) => {
            tracing::error!(
                error = %err,
                raw = %String::from_utf8_lossy(payload),
                "malformed event payload, skipping message"
            );
            return Ok(());
        }
    };

    let notification = LargeTransferNotification::from_event(event, Utc::now());
    store.save(&notification).await?;

    tracing::info!(
        transaction_id = %notification.transaction_id,
        user_id = %notification.user_id,
        amount = notification.amount,
        "notification stored"
    );
    Ok(())
}
