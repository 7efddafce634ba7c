//! Migration to create the exchange_operations table.

use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260701_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExchangeOperations::Table)
                    .if_not_exists()
                    .col(pk_auto(ExchangeOperations::Id))
                    .col(uuid(ExchangeOperations::UserId))
                    .col(string_len(ExchangeOperations::FromCurrency, 3))
                    .col(string_len(ExchangeOperations::ToCurrency, 3))
                    .col(big_integer(ExchangeOperations::Amount))
                    .col(big_integer(ExchangeOperations::ExchangedAmount))
                    .col(double(ExchangeOperations::Rate))
                    .col(string(ExchangeOperations::RequestId).unique_key())
                    .col(
                        timestamp_with_time_zone(ExchangeOperations::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_exchange_operations_user_id")
                            .from(ExchangeOperations::Table, ExchangeOperations::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_exchange_operations_user_id")
                    .table(ExchangeOperations::Table)
                    .col(ExchangeOperations::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExchangeOperations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ExchangeOperations {
    Table,
    Id,
    UserId,
    FromCurrency,
    ToCurrency,
    Amount,
    ExchangedAmount,
    Rate,
    RequestId,
    CreatedAt,
}
