use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use wallet_backend::error::AppError;
use wallet_backend::models::currency::Currency;
use wallet_backend::models::event::LargeTransferEvent;
use wallet_backend::services::auth::AuthService;
use wallet_backend::services::events::{
    start_event_dispatcher, PublishError, TransferEventDispatcher, TransferEventPublisher,
};
use wallet_backend::services::exchange::{ExchangeService, RatesProvider};
use wallet_backend::services::wallet::WalletService;
use wallet_backend::AppState;

pub const TEST_JWT_SECRET: &str = "test-secret";

/// Connects to the test database named by TEST_DATABASE_URL and applies
/// migrations. Returns None (so callers can skip) when the variable is not
/// set; integration scenarios only run against a provisioned database.
pub async fn setup_test_db() -> Option<DatabaseConnection> {
    let database_url = env::var("TEST_DATABASE_URL").ok()?;

    let db = Database::connect(&database_url)
        .await
        .expect("failed to connect to test database");

    Migrator::up(&db, None)
        .await
        .expect("failed to run migrations on test database");

    Some(db)
}

/// Unique suffix so repeated test runs never collide on unique columns.
pub fn unique_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Deterministic rates source: per-currency rates against a common
/// numeraire, pair rates derived as to/from.
pub struct FixedRates {
    rates: HashMap<String, f64>,
}

impl FixedRates {
    pub fn seeded() -> Self {
        let mut rates = HashMap::new();
        rates.insert("USD".to_string(), 1.0);
        rates.insert("EUR".to_string(), 0.92);
        rates.insert("RUB".to_string(), 95.5);
        Self { rates }
    }
}

#[async_trait]
impl RatesProvider for FixedRates {
    async fn get_exchange_rates(&self) -> Result<HashMap<String, f64>, AppError> {
        Ok(self.rates.clone())
    }

    async fn get_rate_for_pair(&self, from: Currency, to: Currency) -> Result<f64, AppError> {
        let from_rate = self.rates[from.as_str()];
        let to_rate = self.rates[to.as_str()];
        Ok(to_rate / from_rate)
    }
}

/// Publisher that records every delivered event for assertions.
#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<LargeTransferEvent>>,
}

#[async_trait]
impl TransferEventPublisher for RecordingPublisher {
    async fn publish(&self, event: &LargeTransferEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Builds a full AppState over the given database with a fixed rates source
/// and a recording event publisher. The dispatcher must stay alive for the
/// duration of the test.
pub fn build_state(
    db: DatabaseConnection,
) -> (AppState, Arc<RecordingPublisher>, TransferEventDispatcher) {
    let publisher = Arc::new(RecordingPublisher::default());
    let (queue, dispatcher) = start_event_dispatcher(publisher.clone(), 2, 100);

    let state = AppState {
        db: db.clone(),
        auth: AuthService::new(db.clone(), TEST_JWT_SECRET, Duration::from_secs(3600)),
        wallet: WalletService::new(db.clone()),
        exchange: ExchangeService::new(
            db,
            Arc::new(FixedRates::seeded()),
            Duration::from_secs(300),
            queue,
        ),
    };

    (state, publisher, dispatcher)
}
