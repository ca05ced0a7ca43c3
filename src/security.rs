use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::User,
};

const DEFAULT_ACCESS_TTL_MINUTES: i64 = 30;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

/// Token claims. Both `sub` (the user's email) and `user_id` must be present
/// for a token to authenticate anyone; decoding fails otherwise.
#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: Uuid,
    pub exp: usize,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    let argon2 = Argon2::default();
    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn issue_access_token(user: &User) -> AppResult<String> {
    let ttl = env_ttl("ACCESS_TOKEN_TTL_MINUTES", DEFAULT_ACCESS_TTL_MINUTES);
    issue_token(user, Duration::minutes(ttl))
}

pub fn issue_refresh_token(user: &User) -> AppResult<String> {
    let ttl = env_ttl("REFRESH_TOKEN_TTL_DAYS", DEFAULT_REFRESH_TTL_DAYS);
    issue_token(user, Duration::days(ttl))
}

/// Decode and verify a bearer token. Returns `None` for anything that should
/// not authenticate: bad signature, expiry, or missing claims.
pub fn decode_token(token: &str) -> AppResult<Option<Claims>> {
    let secret = jwt_secret()?;
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    );
    Ok(decoded.map(|data| data.claims).ok())
}

fn issue_token(user: &User, ttl: Duration) -> AppResult<String> {
    let secret = jwt_secret()?;
    let expiration = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn jwt_secret() -> AppResult<String> {
    std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))
}

fn env_ttl(var: &str, default: i64) -> i64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}
