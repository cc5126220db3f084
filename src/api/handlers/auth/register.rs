//! Account registration: user, key-derivation salt, and pending TOTP device.

use axum::{extract::Extension, http::StatusCode, Json};
use sqlx::PgPool;
use std::sync::Arc;
use totp_rs::Secret;
use tracing::{error, info};

use super::{
    state::AuthConfig,
    storage::{insert_account, SignupOutcome},
    totp_for_secret,
    types::{RegisterRequest, RegisterResponse},
    utils::{generate_derivation_salt, hash_secret, valid_username},
};
use crate::api::handlers::error::ApiError;

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; returns TOTP provisioning URI and salt", body = RegisterResponse),
        (status = 400, description = "Invalid username or password", body = crate::api::handlers::error::ErrorBody),
        (status = 409, description = "Username already exists", body = crate::api::handlers::error::ErrorBody)
    ),
    tag = "account"
)]
pub async fn register(
    pool: Extension<PgPool>,
    config: Extension<Arc<AuthConfig>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    if !valid_username(&request.username) || request.password.is_empty() {
        return Err(ApiError::InvalidInput {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_credentials_shape",
        });
    }

    // The plaintext login password is hashed immediately and never stored.
    let password_hash = hash_secret(&request.password)?;
    let salt = generate_derivation_salt()?;

    let secret = Secret::generate_secret();
    let secret_base32 = secret.to_encoded().to_string();
    let totp = totp_for_secret(&secret_base32, config.issuer(), &request.username)?;
    let uri = totp.get_url();

    match insert_account(
        &pool,
        &request.username,
        &password_hash,
        &salt,
        &secret_base32,
    )
    .await
    {
        Ok(SignupOutcome::Created) => {
            info!("registered user {}", request.username);
            Ok((StatusCode::CREATED, Json(RegisterResponse { uri, salt })))
        }
        Ok(SignupOutcome::Conflict) => Err(ApiError::Conflict),
        Err(err) => {
            error!("Registration failed: {err}");
            Err(ApiError::Internal(err))
        }
    }
}
