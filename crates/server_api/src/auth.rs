use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{
    domain::UserId,
    error::{ApiError, ErrorCode},
    protocol::{LoginRequest, LoginResponse},
};
use storage::StoredUser;
use uuid::Uuid;

use crate::{internal, password::verify_password, summary_from_stored, Actor, ApiContext};

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_secret: String,
    pub token_ttl_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

pub fn issue_token(cfg: &AuthConfig, user: &StoredUser) -> anyhow::Result<(String, DateTime<Utc>)> {
    let now = Utc::now();
    let expires_at = now + Duration::minutes(cfg.token_ttl_minutes);
    let claims = Claims {
        sub: user.id.0,
        role: user.role.as_str().to_string(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.token_secret.as_bytes()),
    )?;
    Ok((token, expires_at))
}

pub fn validate_token(cfg: &AuthConfig, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.token_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::new(ErrorCode::Unauthorized, "Invalid or expired token"))
}

pub async fn login(ctx: &ApiContext, req: &LoginRequest) -> Result<LoginResponse, ApiError> {
    let invalid = || ApiError::new(ErrorCode::Unauthorized, "Invalid login credentials");

    let user = ctx
        .storage
        .find_user_by_email(&req.email)
        .await
        .map_err(internal)?
        .ok_or_else(invalid)?;
    let matches = verify_password(&req.password, &user.password_hash).map_err(|e| {
        tracing::error!(user_id = user.id.0, error = %e, "stored password hash is unusable");
        ApiError::new(ErrorCode::Internal, "stored credentials are unusable")
    })?;
    if !matches {
        tracing::info!(user_id = user.id.0, "login rejected");
        return Err(invalid());
    }

    let (token, expires_at) = issue_token(&ctx.auth, &user).map_err(internal)?;
    tracing::info!(user_id = user.id.0, role = %user.role, "login succeeded");
    Ok(LoginResponse {
        token,
        expires_at,
        user: summary_from_stored(user),
    })
}

/// Turns a bearer token into an actor, reading the role from storage rather than the token.
pub async fn resolve_actor(ctx: &ApiContext, token: &str) -> Result<Actor, ApiError> {
    let claims = validate_token(&ctx.auth, token)?;
    let user = ctx
        .storage
        .load_user(UserId(claims.sub))
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "account no longer exists"))?;
    Ok(Actor {
        user_id: user.id,
        role: user.role,
    })
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
