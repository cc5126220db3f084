//! Vault entry operations: add, edit, delete, retrieve, and the batch
//! variants with per-item partial failure.

use axum::{extract::Extension, http::HeaderMap, http::StatusCode, Json};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::error;
use uuid::Uuid;

use super::{
    storage::{
        delete_entry, insert_entry, list_entries, list_files, update_entry, update_file,
        InsertOutcome, UpdateOutcome,
    },
    types::{
        AddBatchRequest, AddEntryRequest, AddEntryResponse, BatchItemError, BatchResponse,
        DeleteRequest, EditBatchItem, EditBatchRequest, EditEntryRequest, EntryResponse,
        FileResponse,
    },
};
use crate::{
    api::handlers::{
        auth::principal::{require_auth, Principal},
        error::ApiError,
        MessageResponse,
    },
    codec,
};

#[utoipa::path(
    post,
    path = "/vault/add",
    request_body = AddEntryRequest,
    responses(
        (status = 201, description = "Entry created", body = AddEntryResponse),
        (status = 400, description = "Malformed byte map", body = crate::api::handlers::error::ErrorBody),
        (status = 409, description = "Entry with the same name already exists", body = crate::api::handlers::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "vault"
)]
pub async fn add(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<AddEntryRequest>>,
) -> Result<(StatusCode, Json<AddEntryResponse>), ApiError> {
    let principal = require_auth(&headers, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    let password_hex = codec::to_hex(&codec::decode(&request.password)?);
    let iv_hex = codec::to_hex(&codec::decode(&request.iv)?);

    match insert_entry(
        &pool,
        principal.user_id,
        &request.name,
        &request.username,
        &password_hex,
        &iv_hex,
    )
    .await
    {
        Ok(InsertOutcome::Created(id)) => Ok((StatusCode::CREATED, Json(AddEntryResponse { id }))),
        Ok(InsertOutcome::Conflict) => Err(ApiError::Conflict),
        Err(err) => {
            error!("Entry creation failed: {err}");
            Err(ApiError::Internal(err))
        }
    }
}

#[utoipa::path(
    post,
    path = "/vault/add-batch",
    request_body = AddBatchRequest,
    responses(
        (status = 200, description = "All entries created", body = BatchResponse),
        (status = 400, description = "One or more items failed; the rest were persisted", body = BatchResponse)
    ),
    security(("bearer" = [])),
    tag = "vault"
)]
pub async fn add_batch(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<AddBatchRequest>>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    let principal = require_auth(&headers, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    // Items run sequentially so the error list order matches input order.
    let mut errors = Vec::new();
    for item in &request.entries {
        if let Some(item_error) = add_one(&pool, &principal, item).await? {
            errors.push(item_error);
        }
    }

    Ok(batch_result(
        errors,
        "Failed to create entries".to_string(),
    ))
}

/// Process one add-batch item; `Some` is a collected per-item failure.
/// Storage errors still abort the whole batch.
async fn add_one(
    pool: &PgPool,
    principal: &Principal,
    item: &AddEntryRequest,
) -> Result<Option<BatchItemError>, ApiError> {
    let decoded = codec::decode(&item.password).and_then(|password| {
        codec::decode(&item.iv).map(|iv| (codec::to_hex(&password), codec::to_hex(&iv)))
    });
    let (password_hex, iv_hex) = match decoded {
        Ok(pair) => pair,
        Err(err) => {
            return Ok(Some(BatchItemError {
                key: item.name.clone(),
                code: "invalid_byte_map".to_string(),
                message: err.to_string(),
            }));
        }
    };

    match insert_entry(
        pool,
        principal.user_id,
        &item.name,
        &item.username,
        &password_hex,
        &iv_hex,
    )
    .await
    .map_err(ApiError::Internal)?
    {
        InsertOutcome::Created(_) => Ok(None),
        InsertOutcome::Conflict => Ok(Some(BatchItemError {
            key: item.name.clone(),
            code: "conflict".to_string(),
            message: "Entry with the same name already exists".to_string(),
        })),
    }
}

#[utoipa::path(
    post,
    path = "/vault/edit",
    request_body = EditEntryRequest,
    responses(
        (status = 200, description = "Entry edited", body = MessageResponse),
        (status = 401, description = "Entry is absent or not the caller's", body = crate::api::handlers::error::ErrorBody),
        (status = 409, description = "New name collides with another entry", body = crate::api::handlers::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "vault"
)]
pub async fn edit(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<EditEntryRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let principal = require_auth(&headers, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    let password_hex = codec::to_hex(&codec::decode(&request.password)?);
    let iv_hex = codec::to_hex(&codec::decode(&request.iv)?);

    match update_entry(
        &pool,
        principal.user_id,
        request.id,
        &request.name,
        &request.username,
        &password_hex,
        &iv_hex,
    )
    .await
    {
        Ok(UpdateOutcome::Updated) => Ok(Json(MessageResponse {
            message: "Entry edited".to_string(),
        })),
        // Absent and foreign ids are indistinguishable to the caller.
        Ok(UpdateOutcome::NotOwned) => Err(ApiError::Unauthorized),
        Ok(UpdateOutcome::Conflict) => Err(ApiError::Conflict),
        Err(err) => {
            error!("Failed to edit entry: {err}");
            Err(ApiError::Internal(err))
        }
    }
}

#[utoipa::path(
    post,
    path = "/vault/edit-batch",
    request_body = EditBatchRequest,
    responses(
        (status = 200, description = "All entries edited", body = BatchResponse),
        (status = 400, description = "One or more items failed; the rest were applied", body = BatchResponse)
    ),
    security(("bearer" = [])),
    tag = "vault"
)]
pub async fn edit_batch(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<EditBatchRequest>>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    let principal = require_auth(&headers, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    let mut errors = Vec::new();
    for item in &request.entries {
        if let Some(item_error) = edit_one(&pool, &principal, item).await? {
            errors.push(item_error);
        }
    }

    Ok(batch_result(errors, "Failed to edit entries".to_string()))
}

async fn edit_one(
    pool: &PgPool,
    principal: &Principal,
    item: &EditBatchItem,
) -> Result<Option<BatchItemError>, ApiError> {
    let key = item.id.to_string();
    let item_error = |code: &str, message: String| {
        Some(BatchItemError {
            key: key.clone(),
            code: code.to_string(),
            message,
        })
    };

    let decoded = codec::decode(&item.password).and_then(|password| {
        codec::decode(&item.iv).map(|iv| (codec::to_hex(&password), codec::to_hex(&iv)))
    });
    let (password_hex, iv_hex) = match decoded {
        Ok(pair) => pair,
        Err(err) => return Ok(item_error("invalid_byte_map", err.to_string())),
    };

    match update_entry(
        pool,
        principal.user_id,
        item.id,
        &item.name,
        &item.username,
        &password_hex,
        &iv_hex,
    )
    .await
    .map_err(ApiError::Internal)?
    {
        UpdateOutcome::Updated => {}
        UpdateOutcome::NotOwned => {
            return Ok(item_error("unauthorized", "Unauthorized".to_string()));
        }
        UpdateOutcome::Conflict => {
            return Ok(item_error(
                "conflict",
                "Entry with the same name already exists".to_string(),
            ));
        }
    }

    // Nested file updates share the item's fate: a bad file id fails this
    // item only, not the batch.
    for file in &item.files {
        let (file_hex, file_iv_hex) = match codec::decode(&file.file).and_then(|bytes| {
            codec::decode(&file.iv).map(|iv| (codec::to_hex(&bytes), codec::to_hex(&iv)))
        }) {
            Ok(pair) => pair,
            Err(err) => return Ok(item_error("invalid_byte_map", err.to_string())),
        };
        let updated = update_file(
            pool,
            principal.user_id,
            file.id,
            &file.name,
            &file_hex,
            &file_iv_hex,
        )
        .await
        .map_err(ApiError::Internal)?;
        if !updated {
            return Ok(item_error("unauthorized", "Unauthorized".to_string()));
        }
    }

    Ok(None)
}

#[utoipa::path(
    post,
    path = "/vault/delete",
    request_body = DeleteRequest,
    responses(
        (status = 200, description = "Entry deleted", body = MessageResponse),
        (status = 401, description = "Entry is absent or not the caller's", body = crate::api::handlers::error::ErrorBody)
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

    match delete_entry(&pool, principal.user_id, request.id).await {
        Ok(true) => Ok(Json(MessageResponse {
            message: "Entry deleted".to_string(),
        })),
        Ok(false) => Err(ApiError::Unauthorized),
        Err(err) => {
            error!("Failed to delete entry: {err}");
            Err(ApiError::Internal(err))
        }
    }
}

#[utoipa::path(
    get,
    path = "/vault/retrieve",
    responses(
        (status = 200, description = "Every entry owned by the caller, files attached", body = [EntryResponse]),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::handlers::error::ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "vault"
)]
pub async fn retrieve(
    headers: HeaderMap,
    pool: Extension<PgPool>,
) -> Result<Json<Vec<EntryResponse>>, ApiError> {
    let principal = require_auth(&headers, &pool).await?;

    let entries = list_entries(&pool, principal.user_id)
        .await
        .map_err(ApiError::Internal)?;
    let files = list_files(&pool, principal.user_id)
        .await
        .map_err(ApiError::Internal)?;

    let mut files_by_entry: HashMap<Uuid, Vec<FileResponse>> = HashMap::new();
    for file in files {
        let response = FileResponse {
            id: file.id,
            name: file.name,
            file: codec::hex_to_map(&file.file)?,
            iv: codec::hex_to_map(&file.iv)?,
        };
        files_by_entry.entry(file.entry_id).or_default().push(response);
    }

    let mut response = Vec::with_capacity(entries.len());
    for entry in entries {
        response.push(EntryResponse {
            id: entry.id,
            name: entry.name,
            username: entry.username,
            password: codec::hex_to_map(&entry.password)?,
            iv: codec::hex_to_map(&entry.iv)?,
            files: files_by_entry.remove(&entry.id).unwrap_or_default(),
        });
    }

    Ok(Json(response))
}

/// Success only when the error list is empty.
fn batch_result(
    errors: Vec<BatchItemError>,
    failure_message: String,
) -> (StatusCode, Json<BatchResponse>) {
    if errors.is_empty() {
        (
            StatusCode::OK,
            Json(BatchResponse {
                message: "Success".to_string(),
                errors,
            }),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(BatchResponse {
                message: failure_message,
                errors,
            }),
        )
    }
}
