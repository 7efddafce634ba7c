//! Rates service binary: serves exchange-rate lookups over gRPC.

use migration::{Migrator, MigratorTrait};
use tonic::transport::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_backend::config::RatesServerConfig;
use wallet_backend::db;
use wallet_backend::grpc::proto::exchange_service_server::ExchangeServiceServer;
use wallet_backend::grpc::server::ExchangeRatesServer;
use wallet_backend::services::rates::RateSource;
use wallet_backend::shutdown::shutdown_signal;

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

    let config = RatesServerConfig::from_env().expect("invalid configuration");

    tracing::info!("connecting to database...");
    let db = db::connect_with_retry(&config.database.url())
        .await
        .expect("failed to connect to database");

    tracing::info!("running migrations...");
    Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");

    let addr = format!("0.0.0.0:{}", config.grpc_port)
        .parse()
        .expect("invalid grpc listen address");

    tracing::info!(%addr, "rates service listening");

    Server::builder()
        .add_service(ExchangeServiceServer::new(ExchangeRatesServer::new(
            RateSource::new(db),
        )))
        .serve_with_shutdown(addr, shutdown_signal())
        .await
        .expect("grpc server error");

    tracing::info!("rates service stopped");
}
