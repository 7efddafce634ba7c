//! Wallet engine: serialized, idempotent balance mutations.
//!
//! Every balance change goes through [`WalletService::apply_operation`],
//! which runs as a single store transaction: duplicate-request check, row
//! lock with `FOR UPDATE NOWAIT`, signed-delta balance update guarded at
//! zero, and an append to the operations log. Either all of it commits or
//! none of it does.

use sea_orm::sea_query::{Expr, ExprTrait, LockBehavior, LockType};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::entities::{operations, prelude::*, wallets};
use crate::error::AppError;
use crate::models::currency::Currency;
use crate::models::wallet::{
    amount_from_minor_units, amount_to_minor_units, BalanceOperationResponse, DepositRequest,
    UserBalance, WithdrawRequest,
};

#[derive(Debug, Clone, Copy)]
enum OperationKind {
    Deposit,
    Withdraw,
}

#[derive(Clone)]
pub struct WalletService {
    db: DatabaseConnection,
}

impl WalletService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_wallet_by_id(&self, id: Uuid) -> Result<wallets::Model, AppError> {
        Wallets::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn get_user_balance(&self, user_id: Uuid) -> Result<UserBalance, AppError> {
        let wallets = Wallets::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?;

        let mut balance = UserBalance::default();
        for wallet in wallets {
            let amount = amount_from_minor_units(wallet.balance);
            match Currency::parse(&wallet.currency) {
                Some(Currency::USD) => balance.usd = amount,
                Some(Currency::RUB) => balance.rub = amount,
                Some(Currency::EUR) => balance.eur = amount,
                None => {}
            }
        }

        Ok(balance)
    }

    pub async fn deposit(
        &self,
        user_id: Uuid,
        req: DepositRequest,
    ) -> Result<BalanceOperationResponse, AppError> {
        self.perform_operation(
            user_id,
            &req.currency,
            req.amount,
            &req.request_id,
            OperationKind::Deposit,
            "Account topped up successfully",
        )
        .await
    }

    pub async fn withdraw(
        &self,
        user_id: Uuid,
        req: WithdrawRequest,
    ) -> Result<BalanceOperationResponse, AppError> {
        self.perform_operation(
            user_id,
            &req.currency,
            req.amount,
            &req.request_id,
            OperationKind::Withdraw,
            "Withdrawal successful",
        )
        .await
    }

    async fn perform_operation(
        &self,
        user_id: Uuid,
        currency: &str,
        amount: f64,
        request_id: &str,
        kind: OperationKind,
        success_message: &str,
    ) -> Result<BalanceOperationResponse, AppError> {
        let currency = Currency::parse(currency)
            .ok_or_else(|| AppError::InvalidCurrency(currency.to_string()))?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::InvalidAmount);
        }
        if request_id.is_empty() {
            return Err(AppError::InvalidInput("requestID is required".to_string()));
        }

        let wallet = Wallets::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .filter(wallets::Column::Currency.eq(currency.as_str()))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let minor = amount_to_minor_units(amount);
        let delta = match kind {
            OperationKind::Deposit => minor,
            OperationKind::Withdraw => -minor,
        };

        self.apply_operation(wallet.id, delta, request_id).await?;

        tracing::info!(
            user_id = %user_id,
            wallet_id = %wallet.id,
            currency = %currency,
            delta = delta,
            request_id = %request_id,
            "balance operation committed"
        );

        let new_balance = self.get_user_balance(user_id).await?;

        Ok(BalanceOperationResponse {
            message: success_message.to_string(),
            new_balance,
        })
    }

    /// The single mutation primitive. `delta` is signed minor units.
    ///
    /// The row lock uses NOWAIT: under contention the engine fails fast
    /// with a retryable conflict instead of stalling worker threads.
    async fn apply_operation(
        &self,
        wallet_id: Uuid,
        delta: i64,
        request_id: &str,
    ) -> Result<(), AppError> {
        let txn = self.db.begin().await?;

        let already_seen = Operations::find()
            .filter(operations::Column::RequestId.eq(request_id))
            .count(&txn)
            .await?;
        if already_seen > 0 {
            return Err(AppError::DuplicateRequest);
        }

        let wallet = Wallets::find_by_id(wallet_id)
            .lock_with_behavior(LockType::Update, LockBehavior::Nowait)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let new_balance = wallet.balance + delta;
        if new_balance < 0 {
            return Err(AppError::InsufficientFunds);
        }

        let updated = Wallets::update_many()
            .col_expr(wallets::Column::Balance, Expr::value(new_balance))
            .col_expr(
                wallets::Column::Version,
                Expr::col(wallets::Column::Version).add(1),
            )
            .col_expr(
                wallets::Column::UpdatedAt,
                Expr::value(chrono::Utc::now()),
            )
            .filter(wallets::Column::Id.eq(wallet_id))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        operations::ActiveModel {
            wallet_id: Set(wallet_id),
            amount: Set(delta),
            request_id: Set(request_id.to_string()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(())
    }
}
