//! Bearer-session authentication.
//!
//! Token issuance lives in the external auth service, which writes the session
//! record to Redis under `session:<token>` as JSON `{id, email, username}`.
//! This extractor validates the `Authorization: Bearer <token>` header against
//! that record and hands the session user to handlers.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use redis::AsyncCommands;
use tracing::warn;

use crate::errors::AppError;
use crate::models::user::SessionUser;
use crate::state::AppState;

/// Extractor that resolves the request's bearer token to a `SessionUser`.
/// Rejects with 401 on a missing/malformed header or an unknown token.
pub struct AuthUser(pub SessionUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AppError::Unauthorized)?;

        let mut conn = state.redis.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(session_key(token)).await?;
        let raw = raw.ok_or(AppError::Unauthorized)?;

        let user: SessionUser = serde_json::from_str(&raw).map_err(|e| {
            warn!("Malformed session record in Redis: {e}");
            AppError::Unauthorized
        })?;

        Ok(AuthUser(user))
    }
}

/// Extracts the token from an `Authorization` header value.
/// Accepts exactly the `Bearer <token>` scheme; anything else is rejected.
fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn session_key(token: &str) -> String {
    format!("session:{token}")
}
