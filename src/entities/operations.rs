//! SeaORM entity for the operations table.
//!
//! Append-only log of balance mutations; `request_id` carries a unique
//! constraint and serves as the idempotency key for deposits and withdrawals.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "operations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub wallet_id: Uuid,
    /// Signed delta in minor units: positive for deposits, negative for
    /// withdrawals.
    pub amount: i64,
    pub request_id: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
