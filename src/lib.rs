// src/lib.rs

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};

use services::auth::AuthService;
use services::exchange::ExchangeService;
use services::wallet::WalletService;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub auth: AuthService,
    pub wallet: WalletService,
    pub exchange: ExchangeService,
}

pub mod entities {
    pub mod prelude;

    pub mod exchange_operations;
    pub mod exchange_rates;
    pub mod operations;
    pub mod users;
    pub mod wallets;
}

pub mod models {
    pub mod auth;
    pub mod currency;
    pub mod event;
    pub mod exchange;
    pub mod wallet;
}

pub mod services {
    pub mod auth;
    pub mod events;
    pub mod exchange;
    pub mod rates;
    pub mod wallet;
}

pub mod handlers {
    pub mod auth;
    pub mod exchange;
    pub mod health;
    pub mod middleware;
    pub mod wallet;
}

pub mod kafka {
    pub mod consumer;
    pub mod producer;
}

pub mod notifier {
    pub mod mongo;
    pub mod store;
}

pub mod config;
pub mod db;
pub mod error;
pub mod grpc;
pub mod shutdown;

/// Builds the wallet service HTTP router. Balance-touching routes sit
/// behind the bearer-token middleware; register, login and the public
/// rates listing do not.
pub fn api_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/v1/balance", get(handlers::wallet::get_balance))
        .route("/api/v1/wallet/deposit", post(handlers::wallet::deposit))
        .route("/api/v1/wallet/withdraw", post(handlers::wallet::withdraw))
        .route("/api/v1/exchange", post(handlers::exchange::exchange))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::require_auth,
        ));

    Router::new()
        .route("/", get(handlers::health::health))
        .route("/api/v1/register", post(handlers::auth::register))
        .route("/api/v1/login", post(handlers::auth::login))
        .route("/api/v1/exchange/rates", get(handlers::exchange::get_rates))
        .merge(protected)
        .layer(middleware::from_fn(handlers::middleware::request_context))
        .layer(cors)
        .with_state(state)
}
