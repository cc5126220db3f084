//! Session-token issuance and refresh.
//!
//! Login is not a pure read: after the credential check, an account missing
//! its recovery secret or a confirmed TOTP device is deleted in a single
//! cascading transaction and the request fails with a distinct
//! per-precondition code.

use axum::{extract::Extension, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, warn};

use super::{
    state::AuthConfig,
    storage::{
        check_completeness_or_delete, insert_session, lookup_user, rotate_session,
        CompletenessCheck,
    },
    totp_for_secret,
    types::{RefreshRequest, TokenRequest, TokenResponse},
    utils::{generate_session_token, hash_session_token, verify_secret},
};
use crate::api::handlers::error::ApiError;

#[utoipa::path(
    post,
    path = "/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Access and refresh tokens issued", body = TokenResponse),
        (status = 400, description = "Account incomplete; deleted as a side effect", body = crate::api::handlers::error::ErrorBody),
        (status = 401, description = "Invalid credentials or TOTP code", body = crate::api::handlers::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn token(
    pool: Extension<PgPool>,
    config: Extension<Arc<AuthConfig>>,
    payload: Option<Json<TokenRequest>>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    // Unknown user and wrong password take the same path to the same error.
    let user = lookup_user(&pool, &request.username)
        .await
        .map_err(ApiError::Internal)?;
    let Some(user) = user else {
        return Err(ApiError::Unauthorized);
    };
    if !verify_secret(&request.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized);
    }

    let totp_secret = match check_completeness_or_delete(&pool, user.id).await {
        Ok(CompletenessCheck::Ready { totp_secret }) => totp_secret,
        Ok(CompletenessCheck::Incomplete(reason)) => {
            warn!(
                "deleted incomplete account {} ({})",
                request.username,
                reason.code()
            );
            return Err(ApiError::AccountIncomplete(reason));
        }
        Err(err) => {
            error!("Login gate failed: {err}");
            return Err(ApiError::Internal(err));
        }
    };

    if config.require_totp_code() {
        let totp = totp_for_secret(&totp_secret, config.issuer(), &request.username)?;
        let valid = request
            .code
            .as_deref()
            .is_some_and(|code| totp.check_current(code).unwrap_or(false));
        if !valid {
            return Err(ApiError::Unauthorized);
        }
    }

    issue_pair(&pool, &config, user.id).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/token/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair issued", body = TokenResponse),
        (status = 401, description = "Unknown or expired refresh token", body = crate::api::handlers::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    pool: Extension<PgPool>,
    config: Extension<Arc<AuthConfig>>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    let refresh_hash = hash_session_token(&request.refresh_token);
    let access_token = generate_session_token()?;
    let refresh_token = generate_session_token()?;

    let rotated = rotate_session(
        &pool,
        &refresh_hash,
        &hash_session_token(&access_token),
        &hash_session_token(&refresh_token),
        config.access_ttl_seconds(),
        config.refresh_ttl_seconds(),
    )
    .await
    .map_err(ApiError::Internal)?;

    match rotated {
        Some(_user_id) => Ok(Json(TokenResponse {
            access_token,
            refresh_token,
        })),
        None => Err(ApiError::Unauthorized),
    }
}

async fn issue_pair(
    pool: &PgPool,
    config: &AuthConfig,
    user_id: uuid::Uuid,
) -> Result<TokenResponse, ApiError> {
    let access_token = generate_session_token()?;
    let refresh_token = generate_session_token()?;
    insert_session(
        pool,
        user_id,
        &hash_session_token(&access_token),
        &hash_session_token(&refresh_token),
        config.access_ttl_seconds(),
        config.refresh_ttl_seconds(),
    )
    .await
    .map_err(ApiError::Internal)?;
    Ok(TokenResponse {
        access_token,
        refresh_token,
    })
}
