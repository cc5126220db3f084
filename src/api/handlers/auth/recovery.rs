//! Recovery-secret escrow: set and verify with attempt-limited lockout.
//!
//! One row per user. The secret is Argon2id-hashed; the escrowed ciphertext
//! is stored as hex and handed back only after a successful verify. Three
//! failed attempts lock the record for an hour; the counters live in the
//! same relational store as the account so a restart cannot clear a lockout.

use axum::{extract::Extension, Json};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, warn};

use super::{
    state::AuthConfig,
    storage::{
        fetch_recovery, fetch_salt, lookup_user, record_failed_recovery_attempt,
        reset_expired_lockout, upsert_recovery, RecoveryRecord,
    },
    types::{MessageResponse, RecoveryRequest, RecoveryVerifyResponse},
    utils::{hash_secret, verify_secret},
};
use crate::{
    api::handlers::error::ApiError,
    codec::{self, ByteMap},
};

/// What the attempt counter allows before the hash comparison runs.
#[derive(Debug, PartialEq, Eq)]
enum LockoutDecision {
    Proceed,
    /// Window elapsed since the lockout began; counter must be reset first.
    ResetAndProceed,
    Limited,
}

fn lockout_decision(
    attempts: i32,
    last_attempt: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    max_attempts: i32,
    lockout_seconds: i64,
) -> LockoutDecision {
    if attempts < max_attempts {
        return LockoutDecision::Proceed;
    }
    match last_attempt {
        Some(last) if now - last < Duration::seconds(lockout_seconds) => LockoutDecision::Limited,
        _ => LockoutDecision::ResetAndProceed,
    }
}

#[utoipa::path(
    post,
    path = "/recovery",
    request_body = RecoveryRequest,
    responses(
        (status = 200, description = "Secret stored, or escrow released", body = RecoveryVerifyResponse),
        (status = 401, description = "Wrong secret or unknown user", body = crate::api::handlers::error::ErrorBody),
        (status = 429, description = "Attempt limit reached; retry after the cool-down", body = crate::api::handlers::error::ErrorBody)
    ),
    tag = "recovery"
)]
pub async fn recovery(
    pool: Extension<PgPool>,
    config: Extension<Arc<AuthConfig>>,
    payload: Option<Json<RecoveryRequest>>,
) -> Result<axum::response::Response, ApiError> {
    use axum::response::IntoResponse;

    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    if request.verify {
        verify(&pool, &config, &request)
            .await
            .map(|response| Json(response).into_response())
    } else {
        set(&pool, &request)
            .await
            .map(|response| Json(response).into_response())
    }
}

async fn set(pool: &PgPool, request: &RecoveryRequest) -> Result<MessageResponse, ApiError> {
    let user = lookup_user(pool, &request.username)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::Unauthorized)?;

    let (Some(password_map), Some(iv_map)) = (&request.password, &request.iv) else {
        return Err(ApiError::missing_payload());
    };
    let password_hex = codec::to_hex(&codec::decode(password_map)?);
    let iv_hex = codec::to_hex(&codec::decode(iv_map)?);

    // Never reversible: only the Argon2id hash of the phrase is stored.
    let secret_hash = hash_secret(&request.secret)?;

    if let Err(err) = upsert_recovery(pool, user.id, &secret_hash, &password_hex, &iv_hex).await {
        error!("Failed to set recovery secret: {err}");
        return Err(ApiError::Internal(err));
    }

    Ok(MessageResponse {
        message: "Recovery secret set".to_string(),
    })
}

async fn verify(
    pool: &PgPool,
    config: &AuthConfig,
    request: &RecoveryRequest,
) -> Result<RecoveryVerifyResponse, ApiError> {
    let user = lookup_user(pool, &request.username)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::Unauthorized)?;

    // Missing record and wrong secret are indistinguishable to the caller.
    let record = fetch_recovery(pool, user.id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or(ApiError::Unauthorized)?;

    match lockout_decision(
        record.attempts,
        record.last_attempt,
        Utc::now(),
        config.recovery_max_attempts(),
        config.recovery_lockout_seconds(),
    ) {
        LockoutDecision::Limited => {
            warn!("recovery locked out for {}", request.username);
            return Err(ApiError::RateLimited);
        }
        LockoutDecision::ResetAndProceed => {
            // Conditional in SQL: a concurrent failure inside a live window
            // cannot be wiped by this reset.
            reset_expired_lockout(
                pool,
                user.id,
                config.recovery_max_attempts(),
                config.recovery_lockout_seconds(),
            )
            .await
            .map_err(ApiError::Internal)?;
        }
        LockoutDecision::Proceed => {}
    }

    if verify_secret(&request.secret, &record.secret_hash)? {
        // Success leaves the counters untouched.
        release_escrow(pool, user.id, &record).await
    } else {
        record_failed_recovery_attempt(pool, user.id)
            .await
            .map_err(ApiError::Internal)?;
        Err(ApiError::Unauthorized)
    }
}

async fn release_escrow(
    pool: &PgPool,
    user_id: uuid::Uuid,
    record: &RecoveryRecord,
) -> Result<RecoveryVerifyResponse, ApiError> {
    let password: ByteMap = codec::hex_to_map(&record.password)?;
    let iv: ByteMap = codec::hex_to_map(&record.iv)?;
    let salt = fetch_salt(pool, user_id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("salt missing for user {user_id}")))?;
    Ok(RecoveryVerifyResponse { password, iv, salt })
}
