//! End-to-end wallet and exchange scenarios against a real Postgres
//! database. Set TEST_DATABASE_URL to run them; without it every test
//! skips, so the suite stays green on machines without a database.

mod common;

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tower::ServiceExt;
use uuid::Uuid;

use wallet_backend::api_router;
use wallet_backend::entities::{prelude::*, users, wallets};
use wallet_backend::error::AppError;
use wallet_backend::models::auth::{LoginRequest, RegisterRequest};
use wallet_backend::models::exchange::{ExchangeRequest, ExchangeResponse};
use wallet_backend::models::wallet::{DepositRequest, WithdrawRequest};
use wallet_backend::AppState;

use crate::common::{build_state, setup_test_db, unique_suffix};

async fn register_user(state: &AppState, suffix: &str) -> Uuid {
    let username = format!("alice_{suffix}");
    state
        .auth
        .register(RegisterRequest {
            username: username.clone(),
            email: format!("alice_{suffix}@example.com"),
            password: "pw123456".to_string(),
        })
        .await
        .expect("registration failed");

    Users::find()
        .filter(users::Column::Username.eq(&username))
        .one(&state.db)
        .await
        .expect("user lookup failed")
        .expect("registered user missing")
        .id
}

async fn wallet_minor_balance(state: &AppState, user_id: Uuid, currency: &str) -> i64 {
    Wallets::find()
        .filter(wallets::Column::UserId.eq(user_id))
        .filter(wallets::Column::Currency.eq(currency))
        .one(&state.db)
        .await
        .expect("wallet lookup failed")
        .expect("wallet missing")
        .balance
}

fn deposit(amount: f64, currency: &str, request_id: String) -> DepositRequest {
    DepositRequest {
        amount,
        currency: currency.to_string(),
        request_id,
    }
}

fn exchange_req(from: &str, to: &str, amount: f64, request_id: String) -> ExchangeRequest {
    ExchangeRequest {
        from_currency: from.to_string(),
        to_currency: to.to_string(),
        amount,
        request_id,
    }
}

/// Retries on lock conflicts the way an HTTP client would after a 409.
async fn exchange_with_retry(
    state: &AppState,
    user_id: Uuid,
    req: ExchangeRequest,
) -> ExchangeResponse {
    for _ in 0..100 {
        match state.exchange.exchange(user_id, req.clone()).await {
            Ok(response) => return response,
            Err(AppError::LockConflict) => tokio::time::sleep(Duration::from_millis(5)).await,
            Err(err) => panic!("exchange failed: {err}"),
        }
    }
    panic!("exchange kept conflicting");
}

#[tokio::test]
async fn registration_creates_three_zero_wallets() {
    let Some(db) = setup_test_db().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let (state, _publisher, _dispatcher) = build_state(db);
    let user_id = register_user(&state, &unique_suffix()).await;

    let wallets = Wallets::find()
        .filter(wallets::Column::UserId.eq(user_id))
        .all(&state.db)
        .await
        .unwrap();

    assert_eq!(wallets.len(), 3);
    for wallet in &wallets {
        assert_eq!(wallet.balance, 0);
    }

    let mut currencies: Vec<_> = wallets.iter().map(|w| w.currency.clone()).collect();
    currencies.sort();
    assert_eq!(currencies, vec!["EUR", "RUB", "USD"]);

    let fetched = state
        .wallet
        .get_wallet_by_id(wallets[0].id)
        .await
        .expect("wallet fetch failed");
    assert_eq!(fetched.user_id, user_id);

    let missing = state.wallet.get_wallet_by_id(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
}

#[tokio::test]
async fn duplicate_username_and_email_are_distinct_errors() {
    let Some(db) = setup_test_db().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let (state, _publisher, _dispatcher) = build_state(db);
    let suffix = unique_suffix();
    register_user(&state, &suffix).await;

    let same_username = state
        .auth
        .register(RegisterRequest {
            username: format!("alice_{suffix}"),
            email: format!("other_{suffix}@example.com"),
            password: "pw123456".to_string(),
        })
        .await;
    assert!(matches!(same_username, Err(AppError::UsernameExists)));

    let same_email = state
        .auth
        .register(RegisterRequest {
            username: format!("bob_{suffix}"),
            email: format!("alice_{suffix}@example.com"),
            password: "pw123456".to_string(),
        })
        .await;
    assert!(matches!(same_email, Err(AppError::EmailExists)));

    // The failed registrations must not leave partial wallet sets behind.
    let bob = Users::find()
        .filter(users::Column::Username.eq(format!("bob_{suffix}")))
        .one(&state.db)
        .await
        .unwrap();
    assert!(bob.is_none());
}

#[tokio::test]
async fn deposit_is_idempotent_per_request_id() {
    let Some(db) = setup_test_db().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let (state, _publisher, _dispatcher) = build_state(db);
    let suffix = unique_suffix();
    let user_id = register_user(&state, &suffix).await;

    let response = state
        .wallet
        .deposit(user_id, deposit(1000.50, "USD", format!("r1-{suffix}")))
        .await
        .unwrap();
    assert_eq!(response.message, "Account topped up successfully");
    assert_eq!(response.new_balance.usd, 1000.50);

    let replay = state
        .wallet
        .deposit(user_id, deposit(1000.50, "USD", format!("r1-{suffix}")))
        .await;
    assert!(matches!(replay, Err(AppError::DuplicateRequest)));

    assert_eq!(wallet_minor_balance(&state, user_id, "USD").await, 100_050);
}

#[tokio::test]
async fn withdrawal_cannot_overdraw() {
    let Some(db) = setup_test_db().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let (state, _publisher, _dispatcher) = build_state(db);
    let suffix = unique_suffix();
    let user_id = register_user(&state, &suffix).await;

    state
        .wallet
        .deposit(user_id, deposit(100.0, "USD", format!("r1-{suffix}")))
        .await
        .unwrap();

    let overdraw = state
        .wallet
        .withdraw(
            user_id,
            WithdrawRequest {
                amount: 200.0,
                currency: "USD".to_string(),
                request_id: format!("r2-{suffix}"),
            },
        )
        .await;
    assert!(matches!(overdraw, Err(AppError::InsufficientFunds)));

    assert_eq!(wallet_minor_balance(&state, user_id, "USD").await, 10_000);
}

#[tokio::test]
async fn balance_follows_the_operation_sequence() {
    let Some(db) = setup_test_db().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let (state, _publisher, _dispatcher) = build_state(db);
    let suffix = unique_suffix();
    let user_id = register_user(&state, &suffix).await;

    let deposits = [10.0, 20.5, 0.01];
    let withdrawals = [5.25];

    for (i, amount) in deposits.iter().enumerate() {
        state
            .wallet
            .deposit(user_id, deposit(*amount, "EUR", format!("d{i}-{suffix}")))
            .await
            .unwrap();
    }
    for (i, amount) in withdrawals.iter().enumerate() {
        state
            .wallet
            .withdraw(
                user_id,
                WithdrawRequest {
                    amount: *amount,
                    currency: "EUR".to_string(),
                    request_id: format!("w{i}-{suffix}"),
                },
            )
            .await
            .unwrap();
    }

    // 10.00 + 20.50 + 0.01 - 5.25 = 25.26
    assert_eq!(wallet_minor_balance(&state, user_id, "EUR").await, 2526);
}

#[tokio::test]
async fn failed_exchange_leaves_both_balances_unchanged() {
    let Some(db) = setup_test_db().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let (state, _publisher, _dispatcher) = build_state(db);
    let suffix = unique_suffix();
    let user_id = register_user(&state, &suffix).await;

    state
        .wallet
        .deposit(user_id, deposit(100.0, "USD", format!("r1-{suffix}")))
        .await
        .unwrap();

    let result = state
        .exchange
        .exchange(
            user_id,
            exchange_req("USD", "EUR", 1000.0, format!("r2-{suffix}")),
        )
        .await;
    assert!(matches!(result, Err(AppError::InsufficientFunds)));

    assert_eq!(wallet_minor_balance(&state, user_id, "USD").await, 10_000);
    assert_eq!(wallet_minor_balance(&state, user_id, "EUR").await, 0);
}

#[tokio::test]
async fn exchange_converts_with_truncating_minor_units() {
    let Some(db) = setup_test_db().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let (state, _publisher, _dispatcher) = build_state(db);
    let suffix = unique_suffix();
    let user_id = register_user(&state, &suffix).await;

    state
        .wallet
        .deposit(user_id, deposit(100.0, "USD", format!("r1-{suffix}")))
        .await
        .unwrap();

    let response = state
        .exchange
        .exchange(
            user_id,
            exchange_req("USD", "EUR", 50.0, format!("r3-{suffix}")),
        )
        .await
        .unwrap();

    assert_eq!(response.message, "Exchange successful");
    assert_eq!(response.exchanged_amount, 46.0);
    assert_eq!(response.rate, 0.92);

    assert_eq!(wallet_minor_balance(&state, user_id, "USD").await, 5000);
    assert_eq!(wallet_minor_balance(&state, user_id, "EUR").await, 4600);

    // Replaying the exchange must be rejected by the same operation class.
    let replay = state
        .exchange
        .exchange(
            user_id,
            exchange_req("USD", "EUR", 50.0, format!("r3-{suffix}")),
        )
        .await;
    assert!(matches!(replay, Err(AppError::DuplicateRequest)));
    assert_eq!(wallet_minor_balance(&state, user_id, "USD").await, 5000);
}

#[tokio::test]
async fn large_exchange_produces_a_notification_event() {
    let Some(db) = setup_test_db().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let (state, publisher, _dispatcher) = build_state(db);
    let suffix = unique_suffix();
    let user_id = register_user(&state, &suffix).await;

    state
        .wallet
        .deposit(user_id, deposit(40_000.0, "USD", format!("r1-{suffix}")))
        .await
        .unwrap();

    let request_id = format!("r4-{suffix}");
    state
        .exchange
        .exchange(
            user_id,
            exchange_req("USD", "RUB", 35_000.0, request_id.clone()),
        )
        .await
        .unwrap();

    // The event is delivered asynchronously by the worker pool.
    let deadline = Instant::now() + Duration::from_millis(500);
    let event = loop {
        if let Some(event) = publisher
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.transaction_id == request_id)
            .cloned()
        {
            break event;
        }
        assert!(
            Instant::now() < deadline,
            "large transfer event was not published within 500ms"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    };

    assert_eq!(event.user_id, user_id);
    assert_eq!(event.from_currency, "USD");
    assert_eq!(event.to_currency, "RUB");
    assert_eq!(event.amount, 35_000.0);
    assert_eq!(event.rate, 95.5);
}

#[tokio::test]
async fn small_exchange_produces_no_event() {
    let Some(db) = setup_test_db().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let (state, publisher, _dispatcher) = build_state(db);
    let suffix = unique_suffix();
    let user_id = register_user(&state, &suffix).await;

    state
        .wallet
        .deposit(user_id, deposit(100.0, "USD", format!("r1-{suffix}")))
        .await
        .unwrap();
    state
        .exchange
        .exchange(
            user_id,
            exchange_req("USD", "EUR", 50.0, format!("r2-{suffix}")),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let request_id = format!("r2-{suffix}");
    assert!(!publisher
        .events
        .lock()
        .unwrap()
        .iter()
        .any(|e| e.transaction_id == request_id));
}

#[tokio::test]
async fn opposing_concurrent_exchanges_both_commit() {
    let Some(db) = setup_test_db().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let (state, _publisher, _dispatcher) = build_state(db);
    let suffix = unique_suffix();
    let user_id = register_user(&state, &suffix).await;

    state
        .wallet
        .deposit(user_id, deposit(100.0, "USD", format!("r1-{suffix}")))
        .await
        .unwrap();
    state
        .wallet
        .deposit(user_id, deposit(100.0, "EUR", format!("r2-{suffix}")))
        .await
        .unwrap();

    let state_a = state.clone();
    let req_a = exchange_req("USD", "EUR", 10.0, format!("ra-{suffix}"));
    let a = tokio::spawn(async move { exchange_with_retry(&state_a, user_id, req_a).await });

    let state_b = state.clone();
    let req_b = exchange_req("EUR", "USD", 10.0, format!("rb-{suffix}"));
    let b = tokio::spawn(async move { exchange_with_retry(&state_b, user_id, req_b).await });

    a.await.expect("usd->eur task panicked");
    b.await.expect("eur->usd task panicked");

    // USD: 100.00 - 10.00 + trunc(10 * (1/0.92)) = 100.86
    // EUR: 100.00 + trunc(10 * 0.92) - 10.00 = 99.20
    assert_eq!(wallet_minor_balance(&state, user_id, "USD").await, 10_086);
    assert_eq!(wallet_minor_balance(&state, user_id, "EUR").await, 9920);
}

#[tokio::test]
async fn login_timing_does_not_reveal_unknown_users() {
    let Some(db) = setup_test_db().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let (state, _publisher, _dispatcher) = build_state(db);
    let suffix = unique_suffix();
    register_user(&state, &suffix).await;

    let measure = |username: String, state: AppState| async move {
        let mut samples = Vec::new();
        for _ in 0..5 {
            let start = Instant::now();
            let result = state
                .auth
                .login(LoginRequest {
                    username: username.clone(),
                    password: "wrong-password".to_string(),
                })
                .await;
            samples.push(start.elapsed());
            assert!(matches!(result, Err(AppError::InvalidCredentials)));
        }
        samples.sort();
        samples[samples.len() / 2]
    };

    let known = measure(format!("alice_{suffix}"), state.clone()).await;
    let unknown = measure(format!("ghost_{suffix}"), state).await;

    // Both branches hash; medians must be the same order of magnitude. The
    // bound is loose to stay stable on shared hardware.
    assert!(unknown < known * 3, "unknown-user login returned too fast");
    assert!(known < unknown * 3, "known-user login returned too fast");
}

#[tokio::test]
async fn http_flow_register_login_deposit_and_replay() {
    let Some(db) = setup_test_db().await else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let (state, _publisher, _dispatcher) = build_state(db);
    let app = api_router(state);
    let suffix = unique_suffix();

    let register_body = format!(
        r#"{{"username": "carol_{suffix}", "email": "carol_{suffix}@example.com", "password": "pw123456"}}"#
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(register_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["message"], "User registered successfully");

    let login_body = format!(r#"{{"username": "carol_{suffix}", "password": "pw123456"}}"#);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(login_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["token"]
        .as_str()
        .expect("token missing")
        .to_string();

    let deposit_body =
        format!(r#"{{"amount": 25.75, "currency": "USD", "requestID": "http-{suffix}"}}"#);
    let deposit_request = |body: String, token: String| {
        Request::builder()
            .method("POST")
            .uri("/api/v1/wallet/deposit")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body))
            .unwrap()
    };

    let response = app
        .clone()
        .oneshot(deposit_request(deposit_body.clone(), token.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["new_balance"]["USD"], 25.75);

    let response = app
        .oneshot(deposit_request(deposit_body, token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["error"], "duplicate_request");
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
