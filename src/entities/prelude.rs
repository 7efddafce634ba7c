pub use super::exchange_operations::Entity as ExchangeOperations;
pub use super::exchange_rates::Entity as ExchangeRates;
pub use super::operations::Entity as Operations;
pub use super::users::Entity as Users;
pub use super::wallets::Entity as Wallets;
