//! File attachments on vault entries.
//!
//! Files are validated before any decoding of the ciphertext: the name must
//! carry an allowed suffix and the decoded payload must stay under the size
//! cap. Both checks run on the byte-map length, so an oversized upload never
//! allocates the full buffer twice.

use axum::{extract::Extension, http::HeaderMap, http::StatusCode, Json};
use sqlx::PgPool;
use tracing::error;

use super::{
    storage::{delete_file, fetch_entry_owner, insert_file},
    types::{AddFileRequest, DeleteRequest},
};
use crate::{
    api::handlers::{auth::principal::require_auth, error::ApiError, MessageResponse},
    codec,
};

/// Suffixes accepted for file attachments, matched case-insensitively.
const ALLOWED_SUFFIXES: &[&str] = &[".txt", ".csv", ".json", ".pdf", ".zip"];

/// Maximum decoded attachment size, 5 MiB.
const MAX_FILE_BYTES: usize = 5 * 1024 * 1024;

/// Reject names without an allowed suffix (422) and payloads over the size
/// cap (413) before touching storage.
fn validate_file(name: &str, decoded_len: usize) -> Result<(), ApiError> {
    let lowered = name.to_ascii_lowercase();
    if !ALLOWED_SUFFIXES
        .iter()
        .any(|suffix| lowered.ends_with(suffix))
    {
        return Err(ApiError::InvalidInput {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            code: "invalid_file_type",
        });
    }
    if decoded_len > MAX_FILE_BYTES {
        return Err(ApiError::InvalidInput {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            code: "too_large",
        });
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/vault/files/add",
    request_body = AddFileRequest,
    responses(
        (status = 201, description = "File attached to the entry", body = MessageResponse),
        (status = 401, description = "Entry is absent or not the caller's", body = crate::api::handlers::error::ErrorBody),
        (status = 413, description = "File exceeds the size cap", body = crate::api::handlers::error::ErrorBody),
        (status = 422, description = "File suffix is not allowed", body = crate::api::handlers::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "vault"
)]
pub async fn add(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<AddFileRequest>>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let principal = require_auth(&headers, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    validate_file(&request.name, request.file.len())?;

    // Parent ownership gates the insert; an absent entry and a foreign one
    // answer the same way.
    match fetch_entry_owner(&pool, request.id).await {
        Ok(Some(owner)) if owner == principal.user_id => {}
        Ok(_) => return Err(ApiError::Unauthorized),
        Err(err) => {
            error!("Failed to check entry ownership: {err}");
            return Err(ApiError::Internal(err));
        }
    }

    let file_hex = codec::to_hex(&codec::decode(&request.file)?);
    let iv_hex = codec::to_hex(&codec::decode(&request.iv)?);

    match insert_file(&pool, request.id, &request.name, &file_hex, &iv_hex).await {
        Ok(_) => Ok((
            StatusCode::CREATED,
            Json(MessageResponse {
                message: "File added".to_string(),
            }),
        )),
        Err(err) => {
            error!("Failed to add file: {err}");
            Err(ApiError::Internal(err))
        }
    }
}

#[utoipa::path(
    post,
    path = "/vault/files/delete",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "File deleted", body = MessageResponse),
        (status = 401, description = "File is absent or not the caller's", body = crate::api::handlers::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "vault"
)]
pub async fn delete(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<DeleteRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let principal = require_auth(&headers, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    match delete_file(&pool, principal.user_id, request.id).await {
        Ok(true) => Ok(Json(MessageResponse {
            message: "File deleted".to_string(),
        })),
        Ok(false) => Err(ApiError::Unauthorized),
        Err(err) => {
            error!("Failed to delete file: {err}");
            Err(ApiError::Internal(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_suffixes_pass() {
        for name in ["notes.txt", "export.csv", "keys.json", "scan.pdf", "all.zip"] {
            assert!(validate_file(name, 1024).is_ok(), "{name} should pass");
        }
    }

    #[test]
    fn suffix_check_is_case_insensitive() {
        assert!(validate_file("REPORT.PDF", 1024).is_ok());
        assert!(validate_file("Data.Json", 1024).is_ok());
    }

    #[test]
    fn disallowed_suffix_is_unprocessable() {
        let err = validate_file("payload.exe", 16).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "invalid_file_type");
    }

    #[test]
    fn suffix_must_include_the_dot() {
        assert!(validate_file("txt", 16).is_err());
        assert!(validate_file("archivezip", 16).is_err());
    }

    #[test]
    fn oversized_file_is_too_large() {
        let err = validate_file("big.zip", MAX_FILE_BYTES + 1).unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.code(), "too_large");
    }

    #[test]
    fn size_cap_is_inclusive() {
        assert!(validate_file("exact.zip", MAX_FILE_BYTES).is_ok());
    }

    #[test]
    fn suffix_is_checked_before_size() {
        let err = validate_file("big.exe", MAX_FILE_BYTES + 1).unwrap_err();
        assert_eq!(err.code(), "invalid_file_type");
    }
}
