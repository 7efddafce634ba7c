//! Exchange engine: rate lookup through a two-tier TTL cache, the
//! two-wallet transactional swap, and large-transfer event emission.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, ExprTrait, LockBehavior, LockType};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entities::{exchange_operations, prelude::*, wallets};
use crate::error::AppError;
use crate::models::currency::Currency;
use crate::models::event::{is_large_transfer, LargeTransferEvent};
use crate::models::exchange::{ExchangeRequest, ExchangeResponse};
use crate::models::wallet::{amount_from_minor_units, amount_to_minor_units};
use crate::services::events::TransferEventQueue;

/// Source of exchange rates. Implemented by the gRPC client against the
/// rates service, and by in-memory fakes in tests.
#[async_trait]
pub trait RatesProvider: Send + Sync {
    async fn get_exchange_rates(&self) -> Result<HashMap<String, f64>, AppError>;
    async fn get_rate_for_pair(&self, from: Currency, to: Currency) -> Result<f64, AppError>;
}

#[derive(Debug, Clone)]
struct CachedRate {
    rate: f64,
    captured_at: Instant,
}

#[derive(Debug, Clone)]
struct AllRatesSnapshot {
    rates: HashMap<String, f64>,
    captured_at: Instant,
}

/// Two-tier rate cache: per-pair entries and a full snapshot. Readers get
/// copies; the internal maps never leave the lock. Entries expire by age
/// only, never by mutation.
struct RateCache {
    pairs: RwLock<HashMap<String, CachedRate>>,
    all: RwLock<Option<AllRatesSnapshot>>,
    ttl: Duration,
}

impl RateCache {
    fn new(ttl: Duration) -> Self {
        Self {
            pairs: RwLock::new(HashMap::new()),
            all: RwLock::new(None),
            ttl,
        }
    }

    fn is_fresh(&self, captured_at: Instant) -> bool {
        captured_at.elapsed() < self.ttl
    }

    async fn pair_rate(&self, key: &str) -> Option<f64> {
        let pairs = self.pairs.read().await;
        pairs
            .get(key)
            .filter(|cached| self.is_fresh(cached.captured_at))
            .map(|cached| cached.rate)
    }

    async fn store_pair_rate(&self, key: String, rate: f64) {
        let mut pairs = self.pairs.write().await;
        pairs.insert(
            key,
            CachedRate {
                rate,
                captured_at: Instant::now(),
            },
        );
    }

    async fn all_rates(&self) -> Option<HashMap<String, f64>> {
        let all = self.all.read().await;
        all.as_ref()
            .filter(|snapshot| self.is_fresh(snapshot.captured_at))
            .map(|snapshot| snapshot.rates.clone())
    }

    async fn store_all_rates(&self, rates: HashMap<String, f64>) {
        let mut all = self.all.write().await;
        *all = Some(AllRatesSnapshot {
            rates,
            captured_at: Instant::now(),
        });
    }
}

/// Ascending-UUID lock order for the two wallets of an exchange; taking row
/// locks in one canonical order removes ABBA deadlock cycles between
/// opposing concurrent exchanges.
fn lock_order(a: Uuid, b: Uuid) -> [Uuid; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}

#[derive(Clone)]
pub struct ExchangeService {
    db: DatabaseConnection,
    rates: Arc<dyn RatesProvider>,
    cache: Arc<RateCache>,
    events: TransferEventQueue,
}

impl ExchangeService {
    pub fn new(
        db: DatabaseConnection,
        rates: Arc<dyn RatesProvider>,
        cache_ttl: Duration,
        events: TransferEventQueue,
    ) -> Self {
        Self {
            db,
            rates,
            cache: Arc::new(RateCache::new(cache_ttl)),
            events,
        }
    }

    /// All currency -> rate rows, served from the snapshot cache when fresh.
    pub async fn get_exchange_rates(&self) -> Result<HashMap<String, f64>, AppError> {
        if let Some(rates) = self.cache.all_rates().await {
            return Ok(rates);
        }

        let rates = self.rates.get_exchange_rates().await?;
        self.cache.store_all_rates(rates.clone()).await;
        Ok(rates)
    }

    async fn rate_for(&self, from: Currency, to: Currency) -> Result<f64, AppError> {
        let key = format!("{from}_{to}");

        if let Some(rate) = self.cache.pair_rate(&key).await {
            tracing::debug!(from = %from, to = %to, rate, "rate served from cache");
            return Ok(rate);
        }

        let rate = self.rates.get_rate_for_pair(from, to).await?;
        self.cache.store_pair_rate(key, rate).await;
        tracing::debug!(from = %from, to = %to, rate, "rate refreshed from rates service");
        Ok(rate)
    }

    pub async fn exchange(
        &self,
        user_id: Uuid,
        req: ExchangeRequest,
    ) -> Result<ExchangeResponse, AppError> {
        let from = Currency::parse(&req.from_currency)
            .ok_or_else(|| AppError::InvalidCurrency(req.from_currency.clone()))?;
        let to = Currency::parse(&req.to_currency)
            .ok_or_else(|| AppError::InvalidCurrency(req.to_currency.clone()))?;
        if from == to {
            return Err(AppError::InvalidInput(
                "cannot exchange a currency for itself".to_string(),
            ));
        }
        if !req.amount.is_finite() || req.amount <= 0.0 {
            return Err(AppError::InvalidAmount);
        }
        if req.request_id.is_empty() {
            return Err(AppError::InvalidInput("requestID is required".to_string()));
        }

        let rate = self.rate_for(from, to).await?;
        let exchanged_amount = req.amount * rate;

        let amount_minor = amount_to_minor_units(req.amount);
        let exchanged_minor = amount_to_minor_units(exchanged_amount);

        tracing::info!(
            user_id = %user_id,
            from = %from,
            to = %to,
            amount = req.amount,
            rate,
            exchanged_amount,
            request_id = %req.request_id,
            "exchanging currency"
        );

        self.run_exchange_transaction(
            user_id,
            from,
            to,
            amount_minor,
            exchanged_minor,
            rate,
            &req.request_id,
        )
        .await?;

        if is_large_transfer(req.amount, exchanged_amount) {
            self.events.enqueue(LargeTransferEvent {
                transaction_id: req.request_id.clone(),
                user_id,
                from_currency: from.as_str().to_string(),
                to_currency: to.as_str().to_string(),
                amount: req.amount,
                exchanged_amount,
                rate,
                timestamp: chrono::Utc::now(),
            });
        }

        Ok(ExchangeResponse {
            message: "Exchange successful".to_string(),
            exchanged_amount: amount_from_minor_units(exchanged_minor),
            rate,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_exchange_transaction(
        &self,
        user_id: Uuid,
        from: Currency,
        to: Currency,
        amount_minor: i64,
        exchanged_minor: i64,
        rate: f64,
        request_id: &str,
    ) -> Result<(), AppError> {
        let txn = self.db.begin().await?;

        let already_seen = ExchangeOperations::find()
            .filter(exchange_operations::Column::RequestId.eq(request_id))
            .count(&txn)
            .await?;
        if already_seen > 0 {
            return Err(AppError::DuplicateRequest);
        }

        let from_wallet = find_wallet(&txn, user_id, from).await?;
        let to_wallet = find_wallet(&txn, user_id, to).await?;

        let mut locked_balances = HashMap::new();
        for wallet_id in lock_order(from_wallet.id, to_wallet.id) {
            let wallet = Wallets::find_by_id(wallet_id)
                .lock_with_behavior(LockType::Update, LockBehavior::Nowait)
                .one(&txn)
                .await?
                .ok_or(AppError::NotFound)?;
            locked_balances.insert(wallet.id, wallet.balance);
        }

        let new_from_balance = locked_balances[&from_wallet.id] - amount_minor;
        if new_from_balance < 0 {
            return Err(AppError::InsufficientFunds);
        }
        let new_to_balance = locked_balances[&to_wallet.id] + exchanged_minor;

        update_wallet_balance(&txn, from_wallet.id, new_from_balance).await?;
        update_wallet_balance(&txn, to_wallet.id, new_to_balance).await?;

        exchange_operations::ActiveModel {
            user_id: Set(user_id),
            from_currency: Set(from.as_str().to_string()),
            to_currency: Set(to.as_str().to_string()),
            amount: Set(amount_minor),
            exchanged_amount: Set(exchanged_minor),
            rate: Set(rate),
            request_id: Set(request_id.to_string()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(())
    }
}

async fn find_wallet(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    currency: Currency,
) -> Result<wallets::Model, AppError> {
    Wallets::find()
        .filter(wallets::Column::UserId.eq(user_id))
        .filter(wallets::Column::Currency.eq(currency.as_str()))
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)
}

async fn update_wallet_balance(
    txn: &DatabaseTransaction,
    wallet_id: Uuid,
    new_balance: i64,
) -> Result<(), AppError> {
    let updated = Wallets::update_many()
        .col_expr(wallets::Column::Balance, Expr::value(new_balance))
        .col_expr(
            wallets::Column::Version,
            Expr::col(wallets::Column::Version).add(1),
        )
        .col_expr(wallets::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(wallets::Column::Id.eq(wallet_id))
        .exec(txn)
        .await?;

    if updated.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}
