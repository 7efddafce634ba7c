//! SeaORM entity for the exchange_operations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "exchange_operations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: Uuid,
    pub from_currency: String,
    pub to_currency: String,
    /// Debited amount in minor units of the source currency.
    pub amount: i64,
    /// Credited amount in minor units of the destination currency.
    pub exchanged_amount: i64,
    pub rate: f64,
    pub request_id: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
