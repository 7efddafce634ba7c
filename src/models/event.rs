use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Threshold, in major units of either side, above which an exchange emits
/// a large-transfer event.
pub const LARGE_TRANSFER_THRESHOLD: f64 = 30_000.0;

/// Event published to the durable log for exchanges crossing the threshold.
/// The transaction id is the originating request id, which also keys the
/// topic partition so deliveries for one transaction stay ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeTransferEvent {
    pub transaction_id: String,
    pub user_id: Uuid,
    pub from_currency: String,
    pub to_currency: String,
    pub amount: f64,
    pub exchanged_amount: f64,
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
}

/// True when either side of the exchange reaches the threshold in its own
/// major units.
pub fn is_large_transfer(amount: f64, exchanged_amount: f64) -> bool {
    amount >= LARGE_TRANSFER_THRESHOLD || exchanged_amount >= LARGE_TRANSFER_THRESHOLD
}
