//! Request/response types for vault entry and file endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::codec::ByteMap;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AddEntryRequest {
    /// Display name, unique per user.
    pub name: String,
    /// Site/account username; opaque to the server but not ciphertext.
    pub username: String,
    pub password: ByteMap,
    pub iv: ByteMap,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AddEntryResponse {
    pub id: uuid::Uuid,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AddBatchRequest {
    pub entries: Vec<AddEntryRequest>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EditEntryRequest {
    pub id: uuid::Uuid,
    pub name: String,
    pub username: String,
    pub password: ByteMap,
    pub iv: ByteMap,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EditBatchItem {
    pub id: uuid::Uuid,
    pub name: String,
    pub username: String,
    pub password: ByteMap,
    pub iv: ByteMap,
    #[serde(default)]
    pub files: Vec<EditFileItem>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EditFileItem {
    pub id: uuid::Uuid,
    pub name: String,
    pub file: ByteMap,
    pub iv: ByteMap,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EditBatchRequest {
    pub entries: Vec<EditBatchItem>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct DeleteRequest {
    pub id: uuid::Uuid,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AddFileRequest {
    /// Parent entry id.
    pub id: uuid::Uuid,
    pub name: String,
    pub file: ByteMap,
    pub iv: ByteMap,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EntryResponse {
    pub id: uuid::Uuid,
    pub name: String,
    pub username: String,
    pub password: ByteMap,
    pub iv: ByteMap,
    pub files: Vec<FileResponse>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct FileResponse {
    pub id: uuid::Uuid,
    pub name: String,
    pub file: ByteMap,
    pub iv: ByteMap,
}

/// One failed batch item. `key` is the item's name (add) or id (edit),
/// in input order.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BatchItemError {
    pub key: String,
    pub code: String,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct BatchResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<BatchItemError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn add_request_decodes_wire_shape() -> Result<()> {
        let request: AddEntryRequest = serde_json::from_value(serde_json::json!({
            "name": "gmail",
            "username": "alice@example.com",
            "password": {"0": 1, "1": 2},
            "iv": {"0": 9},
        }))?;
        assert_eq!(crate::codec::decode(&request.password)?, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn edit_batch_item_files_default_to_empty() -> Result<()> {
        let item: EditBatchItem = serde_json::from_value(serde_json::json!({
            "id": uuid::Uuid::new_v4(),
            "name": "gmail",
            "username": "alice",
            "password": {"0": 1},
            "iv": {"0": 2},
        }))?;
        assert!(item.files.is_empty());
        Ok(())
    }

    #[test]
    fn batch_response_omits_empty_errors() -> Result<()> {
        let response = BatchResponse {
            message: "Success".to_string(),
            errors: Vec::new(),
        };
        let value = serde_json::to_value(&response)?;
        assert!(value.get("errors").is_none());
        Ok(())
    }
}
