//! Migration to create and seed the exchange_rates table.
//!
//! Each rate is the number of units of that currency per one unit of the
//! shared numeraire (USD), so pair rates derive as to_rate / from_rate.
//! Seed values must be nonzero; a zero rate is treated as invalid reference
//! data at read time.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExchangeRates::Table)
                    .if_not_exists()
                    .col(pk_auto(ExchangeRates::Id))
                    .col(string_len(ExchangeRates::Currency, 3).unique_key())
                    .col(double(ExchangeRates::Rate))
                    .col(
                        timestamp_with_time_zone(ExchangeRates::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        let seed = Query::insert()
            .into_table(ExchangeRates::Table)
            .columns([ExchangeRates::Currency, ExchangeRates::Rate])
            .values_panic(["USD".into(), 1.0.into()])
            .values_panic(["RUB".into(), 95.5.into()])
            .values_panic(["EUR".into(), 0.92.into()])
            .to_owned();

        manager.exec_stmt(seed).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExchangeRates::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ExchangeRates {
    Table,
    Id,
    Currency,
    Rate,
    UpdatedAt,
}
