//! TOTP device confirmation.
//!
//! Confirmation flips the device's `confirmed` flag; until then the account
//! cannot obtain a trusted session and will be deleted at first login.

use axum::{extract::Extension, Json};
use sqlx::PgPool;
use tracing::error;

use super::{
    storage::confirm_totp_device,
    types::{ConfirmTwoFactorRequest, MessageResponse},
};
use crate::api::handlers::error::ApiError;

#[utoipa::path(
    post,
    path = "/confirm2fa",
    request_body = ConfirmTwoFactorRequest,
    responses(
        (status = 200, description = "2FA confirmed", body = MessageResponse),
        (status = 404, description = "No TOTP device for this user", body = crate::api::handlers::error::ErrorBody)
    ),
    tag = "account"
)]
pub async fn confirm(
    pool: Extension<PgPool>,
    payload: Option<Json<ConfirmTwoFactorRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    match confirm_totp_device(&pool, &request.username).await {
        Ok(true) => Ok(Json(MessageResponse {
            message: "2FA confirmed".to_string(),
        })),
        Ok(false) => Err(ApiError::NotFound),
        Err(err) => {
            error!("Failed to confirm 2FA: {err}");
            Err(ApiError::Internal(err))
        }
    }
}
