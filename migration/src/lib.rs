pub use sea_orm_migration::prelude::*;

mod m20260701_000001_create_users;
mod m20260701_000002_create_wallets;
mod m20260701_000003_create_operations;
mod m20260701_000004_create_exchange_operations;
mod m20260702_000001_create_exchange_rates;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260701_000001_create_users::Migration),
            Box::new(m20260701_000002_create_wallets::Migration),
            Box::new(m20260701_000003_create_operations::Migration),
            Box::new(m20260701_000004_create_exchange_operations::Migration),
            Box::new(m20260702_000001_create_exchange_rates::Migration),
        ]
    }
}
