//! Authentication subsystem: registration, login and bearer-token handling.

use std::time::Duration;

use argon2::{
    password_hash::{
        rand_core::OsRng, Error as PasswordHashError, PasswordHash, PasswordHasher,
        PasswordVerifier, SaltString,
    },
    Argon2,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait};
use uuid::Uuid;

use crate::entities::{prelude::*, users, wallets};
use crate::error::AppError;
use crate::models::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::models::currency::Currency;

/// Fixed argon2 hash compared against on the unknown-user branch of login,
/// so that a missing user costs the same as a wrong password.
const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$VE0e3g7DalWHgDwou3nuRA$uC6TER156UQpk0lNQ5+jHM0l5poVjPA1he/Tyn9J4Zw";

/// Mints and validates HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
}

impl TokenManager {
    pub fn new(secret: &str, token_ttl: Duration) -> Self {
        // Pinning the algorithm list to HS256 rejects algorithm-confusion
        // tokens at decode time.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token_ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, username: &str) -> Result<String, AppError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now,
            nbf: now,
            exp: now + self.token_ttl.as_secs(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AppError::Internal(format!("failed to sign token: {err}")))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => AppError::TokenNotActive,
                _ => AppError::InvalidToken,
            }
        })?;

        let claims = data.claims;
        if claims.sub.is_nil() || claims.username.is_empty() {
            return Err(AppError::InvalidToken);
        }

        Ok(claims)
    }
}

#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
    tokens: TokenManager,
}

impl AuthService {
    pub fn new(db: DatabaseConnection, jwt_secret: &str, token_ttl: Duration) -> Self {
        Self {
            db,
            tokens: TokenManager::new(jwt_secret, token_ttl),
        }
    }

    /// Creates the user plus one zero-balance wallet per supported currency
    /// in a single transaction; no partial wallet set can persist.
    pub async fn register(&self, req: RegisterRequest) -> Result<RegisterResponse, AppError> {
        validate_registration(&req)?;

        let password_hash = hash_password(&req.password)?;
        let user_id = Uuid::new_v4();

        let txn = self.db.begin().await?;

        users::ActiveModel {
            id: Set(user_id),
            username: Set(req.username.clone()),
            email: Set(req.email.clone()),
            password_hash: Set(password_hash),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for currency in Currency::ALL {
            wallets::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                currency: Set(currency.as_str().to_string()),
                balance: Set(0),
                version: Set(1),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        tracing::info!(user_id = %user_id, username = %req.username, "user registered");

        Ok(RegisterResponse {
            message: "User registered successfully".to_string(),
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let user = Users::find()
            .filter(users::Column::Username.eq(&req.username))
            .one(&self.db)
            .await?;

        // Always perform a hash comparison, against a fixed dummy hash when
        // the user does not exist, to keep the two failure paths at the
        // same cost.
        let hash_to_compare = user
            .as_ref()
            .map(|u| u.password_hash.as_str())
            .unwrap_or(DUMMY_PASSWORD_HASH);

        let verified = verify_password(&req.password, hash_to_compare)?;

        let user = match user {
            Some(user) if verified => user,
            _ => return Err(AppError::InvalidCredentials),
        };

        let token = self.tokens.issue(user.id, &user.username)?;

        tracing::info!(user_id = %user.id, username = %user.username, "user logged in");

        Ok(LoginResponse { token })
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        self.tokens.validate(token)
    }
}

fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    let username_len = req.username.chars().count();
    if username_len < 3 || username_len > 50 {
        return Err(AppError::InvalidInput(
            "username must be 3-50 characters".to_string(),
        ));
    }
    if !is_well_formed_email(&req.email) {
        return Err(AppError::InvalidInput("email is not valid".to_string()));
    }
    if req.password.chars().count() < 6 {
        return Err(AppError::InvalidInput(
            "password must be at least 6 characters".to_string(),
        ));
    }
    Ok(())
}

fn is_well_formed_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && !domain.starts_with('.') && !domain.ends_with('.')
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Internal(format!("failed to hash password: {err}")))
}

/// Returns Ok(true) on a match, Ok(false) on a mismatch, and an error only
/// for malformed hashes.
fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| AppError::Internal(format!("stored password hash is invalid: {err}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PasswordHashError::Password) => Ok(false),
        Err(err) => Err(AppError::Internal(format!(
            "password verification failed: {err}"
        ))),
    }
}
