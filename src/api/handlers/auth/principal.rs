//! Authenticated principal extraction for bearer-token requests.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use super::{storage::lookup_access_session, utils::hash_session_token};
use crate::api::handlers::error::ApiError;

/// Authenticated user context derived from the bearer access token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
}

/// Resolve the `Authorization: Bearer` header into a principal, or fail
/// `Unauthorized` for missing, unknown, or expired tokens.
pub(crate) async fn require_auth(headers: &HeaderMap, pool: &PgPool) -> Result<Principal, ApiError> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(ApiError::Unauthorized);
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_session_token(&token);
    match lookup_access_session(pool, &token_hash).await {
        Ok(Some((user_id, username))) => Ok(Principal { user_id, username }),
        Ok(None) => Err(ApiError::Unauthorized),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            Err(ApiError::Internal(err))
        }
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn rejects_missing_or_empty_tokens() {
        let headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_none());
    }
}
