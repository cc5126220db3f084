//! Authenticated key-derivation salt fetch.

use axum::{extract::Extension, http::HeaderMap, Json};
use sqlx::PgPool;
use tracing::error;

use super::{principal::require_auth, storage::fetch_salt, types::SaltResponse};
use crate::api::handlers::error::ApiError;

#[utoipa::path(
    get,
    path = "/salt",
    responses(
        (status = 200, description = "The caller's key-derivation salt", body = SaltResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::handlers::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "account"
)]
pub async fn salt(
    headers: HeaderMap,
    pool: Extension<PgPool>,
) -> Result<Json<SaltResponse>, ApiError> {
    let principal = require_auth(&headers, &pool).await?;
    match fetch_salt(&pool, principal.user_id).await {
        Ok(Some(salt)) => Ok(Json(SaltResponse { salt })),
        // Registration creates the salt with the user, so absence means the
        // account is gone.
        Ok(None) => Err(ApiError::NotFound),
        Err(err) => {
            error!("Failed to fetch salt: {err}");
            Err(ApiError::Internal(err))
        }
    }
}
