use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};

use crate::error::AppError;
use crate::models::auth::AuthUser;
use crate::models::wallet::{
    BalanceOperationResponse, BalanceResponse, DepositRequest, WithdrawRequest,
};
use crate::AppState;

pub async fn get_balance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.wallet.get_user_balance(user.user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

pub async fn deposit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<DepositRequest>, JsonRejection>,
) -> Result<Json<BalanceOperationResponse>, AppError> {
    let Json(payload) = payload.map_err(|rejection| AppError::InvalidJson(rejection.body_text()))?;

    let response = state.wallet.deposit(user.user_id, payload).await?;
    Ok(Json(response))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Json<BalanceOperationResponse>, AppError> {
    let Json(payload) = payload.map_err(|rejection| AppError::InvalidJson(rejection.body_text()))?;

    let response = state.wallet.withdraw(user.user_id, payload).await?;
    Ok(Json(response))
}
