use std::sync::Arc;
use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_backend::config::WalletConfig;
use wallet_backend::grpc::client::GrpcRatesClient;
use wallet_backend::kafka::producer::{DisabledTransferPublisher, KafkaTransferPublisher};
use wallet_backend::services::auth::AuthService;
use wallet_backend::services::events::{
    start_event_dispatcher, TransferEventPublisher, EVENT_QUEUE_CAPACITY, EVENT_WORKER_COUNT,
};
use wallet_backend::services::exchange::ExchangeService;
use wallet_backend::services::wallet::WalletService;
use wallet_backend::shutdown::shutdown_signal;
use wallet_backend::{api_router, db, AppState};

/// Grace period for draining in-flight event workers on shutdown.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wallet_backend=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = WalletConfig::from_env().expect("invalid configuration");

    tracing::info!("connecting to database...");
    let db = db::connect_with_retry(&config.database.url())
        .await
        .expect("failed to connect to database");

    tracing::info!("running migrations...");
    Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");

    let rates_client = GrpcRatesClient::connect(config.exchanger.addr.clone(), config.exchanger.timeout)
        .await
        .expect("failed to connect to rates service");

    let publisher: Arc<dyn TransferEventPublisher> = if config.kafka.enabled {
        Arc::new(
            KafkaTransferPublisher::new(&config.kafka.brokers, &config.kafka.topic)
                .expect("failed to create kafka producer"),
        )
    } else {
        tracing::info!("kafka disabled, large transfer events will be dropped");
        Arc::new(DisabledTransferPublisher)
    };

    let (event_queue, event_dispatcher) =
        start_event_dispatcher(Arc::clone(&publisher), EVENT_WORKER_COUNT, EVENT_QUEUE_CAPACITY);

    let state = AppState {
        db: db.clone(),
        auth: AuthService::new(db.clone(), &config.jwt.secret, config.jwt.expiration),
        wallet: WalletService::new(db.clone()),
        exchange: ExchangeService::new(
            db,
            Arc::new(rates_client),
            config.rates_cache_ttl,
            event_queue,
        ),
    };

    let app = api_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port))
        .await
        .expect("failed to bind http listener");

    tracing::info!(
        "wallet service listening on {}",
        listener.local_addr().expect("listener has no local addr")
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("http server error");

    tracing::info!("http server stopped, draining event workers");
    event_dispatcher.shutdown(SHUTDOWN_DEADLINE).await;
    publisher.close().await;

    tracing::info!("wallet service stopped");
}
