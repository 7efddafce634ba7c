//! Service error taxonomy with HTTP status mapping.
//!
//! Store-specific failures (unique violations, check violations, row locks)
//! are translated into this taxonomy exactly once, in the `From<DbErr>`
//! impl; everything above the storage boundary works in these terms.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;

/// JSON error envelope: `{"error": "<code>", "message": "<human>"}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid or unsupported currency: {0}")]
    InvalidCurrency(String),

    #[error("amount must be a positive number")]
    InvalidAmount,

    #[error("malformed JSON body: {0}")]
    InvalidJson(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("token has expired")]
    TokenExpired,

    #[error("token not active yet")]
    TokenNotActive,

    #[error("invalid token")]
    InvalidToken,

    #[error("unauthorized")]
    Unauthorized,

    #[error("username already exists")]
    UsernameExists,

    #[error("email already exists")]
    EmailExists,

    #[error("duplicate request")]
    DuplicateRequest,

    #[error("resource not found")]
    NotFound,

    #[error("insufficient funds")]
    InsufficientFunds,

    /// Row lock could not be acquired (`FOR UPDATE NOWAIT`). Retryable by
    /// the caller; the engine itself never retries.
    #[error("wallet is busy, retry the request")]
    LockConflict,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code used in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidCurrency(_) => "invalid_currency",
            Self::InvalidAmount => "invalid_amount",
            Self::InvalidJson(_) => "invalid_json",
            Self::InvalidCredentials => "invalid_credentials",
            Self::TokenExpired => "token_expired",
            Self::TokenNotActive => "token_not_active",
            Self::InvalidToken => "invalid_token",
            Self::Unauthorized => "unauthorized",
            Self::UsernameExists => "username_exists",
            Self::EmailExists => "email_exists",
            Self::DuplicateRequest => "duplicate_request",
            Self::NotFound => "not_found",
            Self::InsufficientFunds => "insufficient_funds",
            Self::LockConflict => "conflict",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidCurrency(_)
            | Self::InvalidAmount
            | Self::InvalidJson(_)
            | Self::UsernameExists
            | Self::EmailExists
            | Self::InsufficientFunds => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials
            | Self::TokenExpired
            | Self::TokenNotActive
            | Self::InvalidToken
            | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::DuplicateRequest | Self::LockConflict => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details go to the log, never to the client.
        let message = match &self {
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed with internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = axum::Json(ErrorResponse {
            error: self.code().to_string(),
            message,
        });
        (status, body).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(message)) = err.sql_err() {
            // Postgres reports the violated constraint by name; the schema
            // names carry the distinguishing column.
            if message.contains("username") {
                return AppError::UsernameExists;
            }
            if message.contains("email") {
                return AppError::EmailExists;
            }
            if message.contains("request_id") {
                return AppError::DuplicateRequest;
            }
            return AppError::Internal(message);
        }

        let message = err.to_string();
        if message.contains("could not obtain lock") || message.contains("55P03") {
            return AppError::LockConflict;
        }
        if message.contains("violates check constraint") || message.contains("23514") {
            return AppError::InsufficientFunds;
        }

        AppError::Internal(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            AppError::InvalidAmount.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InsufficientFunds.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::DuplicateRequest.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::LockConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(AppError::DuplicateRequest.code(), "duplicate_request");
        assert_eq!(AppError::UsernameExists.code(), "username_exists");
        assert_eq!(AppError::EmailExists.code(), "email_exists");
        assert_eq!(AppError::InvalidJson("x".into()).code(), "invalid_json");
    }

    #[test]
    fn lock_not_available_maps_to_conflict() {
        let err = DbErr::Custom("error returned from database: could not obtain lock on row in relation \"wallets\"".into());
        assert!(matches!(AppError::from(err), AppError::LockConflict));
    }

    #[test]
    fn check_violation_maps_to_insufficient_funds() {
        let err = DbErr::Custom(
            "new row for relation \"wallets\" violates check constraint \"wallets_balance_check\""
                .into(),
        );
        assert!(matches!(AppError::from(err), AppError::InsufficientFunds));
    }

    #[test]
    fn unknown_database_errors_stay_internal() {
        let err = DbErr::Custom("connection reset".into());
        assert!(matches!(AppError::from(err), AppError::Internal(_)));
    }
}
