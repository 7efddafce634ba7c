//! Notification service binary: consumes large-transfer events and stores
//! deduplicated notifications in MongoDB.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_backend::config::NotifierConfig;
use wallet_backend::kafka::consumer::NotificationConsumer;
use wallet_backend::notifier::mongo::MongoNotificationStore;
use wallet_backend::shutdown::shutdown_signal;

/// Grace period for in-flight message processing on shutdown.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wallet_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = NotifierConfig::from_env().expect("invalid configuration");

    let store = MongoNotificationStore::connect(&config.mongo)
        .await
        .expect("failed to connect to mongodb");

    let consumer = NotificationConsumer::start(&config, Arc::new(store))
        .expect("failed to start kafka consumer");

    shutdown_signal().await;

    tracing::info!("closing notification consumer");
    consumer.shutdown(SHUTDOWN_DEADLINE).await;

    tracing::info!("notification service stopped");
}
