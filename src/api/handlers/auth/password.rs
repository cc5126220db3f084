//! Authenticated login-password reset.

use axum::{extract::Extension, http::HeaderMap, Json};
use sqlx::PgPool;
use tracing::error;

use super::{
    principal::require_auth,
    storage::{lookup_user, update_password_hash},
    types::{MessageResponse, ResetPasswordRequest},
    utils::{hash_secret, verify_secret},
};
use crate::api::handlers::error::ApiError;

#[utoipa::path(
    post,
    path = "/password/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 401, description = "Old password does not match", body = crate::api::handlers::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "account"
)]
pub async fn reset(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let principal = require_auth(&headers, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };
    if request.new_password.is_empty() {
        return Err(ApiError::InvalidInput {
            status: axum::http::StatusCode::BAD_REQUEST,
            code: "invalid_credentials_shape",
        });
    }

    let user = lookup_user(&pool, &principal.username)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::Unauthorized)?;
    if !verify_secret(&request.old_password, &user.password_hash)? {
        return Err(ApiError::Unauthorized);
    }

    let new_hash = hash_secret(&request.new_password)?;
    if let Err(err) = update_password_hash(&pool, user.id, &new_hash).await {
        error!("Password reset failed: {err}");
        return Err(ApiError::Internal(err));
    }

    Ok(Json(MessageResponse {
        message: "Password reset".to_string(),
    }))
}
