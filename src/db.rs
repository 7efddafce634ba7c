//! Database connection setup shared by the service binaries.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

const CONNECT_ATTEMPTS: u32 = 5;

/// Opens a bounded connection pool, retrying the initial dial with
/// exponential backoff so the service survives a database that comes up
/// slightly later than it does.
pub async fn connect_with_retry(url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(url.to_owned());
    options
        .max_connections(200)
        .min_connections(10)
        .connect_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(false);

    let mut delay = Duration::from_secs(1);
    let mut last_err = None;

    for attempt in 1..=CONNECT_ATTEMPTS {
        match Database::connect(options.clone()).await {
            Ok(db) => match db.ping().await {
                Ok(()) => {
                    tracing::info!("database connection established");
                    return Ok(db);
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "database ping failed");
                    last_err = Some(err);
                }
            },
            Err(err) => {
                tracing::warn!(attempt, error = %err, "database connection failed");
                last_err = Some(err);
            }
        }

        tokio::time::sleep(delay).await;
        delay *= 2;
    }

    Err(last_err
        .unwrap_or_else(|| DbErr::Custom("database connection failed".to_string())))
}
