//! Migration to create the operations table (append-only balance mutations).

use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260701_000002_create_wallets::Wallets;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Operations::Table)
                    .if_not_exists()
                    .col(pk_auto(Operations::Id))
                    .col(uuid(Operations::WalletId))
                    .col(big_integer(Operations::Amount))
                    .col(string(Operations::RequestId).unique_key())
                    .col(timestamp_with_time_zone(Operations::CreatedAt).default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_operations_wallet_id")
                            .from(Operations::Table, Operations::WalletId)
                            .to(Wallets::Table, Wallets::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookup path for wallet history.
        manager
            .create_index(
                Index::create()
                    .name("idx_operations_wallet_id")
                    .table(Operations::Table)
                    .col(Operations::WalletId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Operations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Operations {
    Table,
    Id,
    WalletId,
    Amount,
    RequestId,
    CreatedAt,
}
