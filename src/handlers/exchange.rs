use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};

use crate::error::AppError;
use crate::models::auth::AuthUser;
use crate::models::exchange::{ExchangeRequest, ExchangeResponse, RatesResponse};
use crate::AppState;

pub async fn get_rates(State(state): State<AppState>) -> Result<Json<RatesResponse>, AppError> {
    let rates = state.exchange.get_exchange_rates().await?;
    Ok(Json(RatesResponse { rates }))
}

pub async fn exchange(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<Json<ExchangeResponse>, AppError> {
    let Json(payload) = payload.map_err(|rejection| AppError::InvalidJson(rejection.body_text()))?;

    let response = state.exchange.exchange(user.user_id, payload).await?;
    Ok(Json(response))
}
