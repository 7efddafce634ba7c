//! Migration to create the wallets table.
//!
//! Balance is minor units and must stay non-negative; the check constraint
//! is the second line of defense behind the in-transaction guard. One wallet
//! per (user, currency) pair.

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
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(uuid(Wallets::Id).primary_key())
                    .col(uuid(Wallets::UserId))
                    .col(string_len(Wallets::Currency, 3))
                    .col(
                        big_integer(Wallets::Balance)
                            .default(0)
                            .check(Expr::col(Wallets::Balance).gte(0)),
                    )
                    .col(big_integer(Wallets::Version).default(1))
                    .col(timestamp_with_time_zone(Wallets::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp_with_time_zone(Wallets::UpdatedAt).default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wallets_user_id")
                            .from(Wallets::Table, Wallets::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_wallets_user_currency")
                    .table(Wallets::Table)
                    .col(Wallets::UserId)
                    .col(Wallets::Currency)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Wallets {
    Table,
    Id,
    UserId,
    Currency,
    Balance,
    Version,
    CreatedAt,
    UpdatedAt,
}
