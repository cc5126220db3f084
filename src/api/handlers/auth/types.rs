//! Request/response types for account, session, and recovery endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::codec::ByteMap;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    /// otpauth:// provisioning URI for the authenticator app.
    pub uri: String,
    /// Per-user key-derivation salt, lowercase hex.
    pub salt: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ConfirmTwoFactorRequest {
    pub username: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
    /// Live TOTP code; required when the server enforces code verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SaltResponse {
    pub salt: String,
}

/// One endpoint serves both recovery operations; `verify` picks set vs
/// verify, matching the upstream wire shape.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RecoveryRequest {
    pub username: String,
    pub secret: String,
    #[serde(default)]
    pub verify: bool,
    /// Escrowed ciphertext, required for set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<ByteMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<ByteMap>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RecoveryVerifyResponse {
    pub password: ByteMap,
    pub iv: ByteMap,
    pub salt: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn token_response_uses_camel_case() -> Result<()> {
        let response = TokenResponse {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        value.get("accessToken").context("missing accessToken")?;
        value.get("refreshToken").context("missing refreshToken")?;
        Ok(())
    }

    #[test]
    fn recovery_request_verify_defaults_to_false() -> Result<()> {
        let request: RecoveryRequest =
            serde_json::from_value(serde_json::json!({"username": "alice", "secret": "s"}))?;
        assert!(!request.verify);
        assert!(request.password.is_none());
        Ok(())
    }

    #[test]
    fn recovery_request_round_trips_byte_maps() -> Result<()> {
        let request: RecoveryRequest = serde_json::from_value(serde_json::json!({
            "username": "alice",
            "secret": "s",
            "password": {"0": 1, "1": 2},
            "iv": {"0": 3},
        }))?;
        let password = request.password.context("missing password map")?;
        assert_eq!(crate::codec::decode(&password)?, vec![1, 2]);
        Ok(())
    }
}
