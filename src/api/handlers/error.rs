//! Client-facing error kinds.
//!
//! Every operation resolves failures into one of these kinds instead of a
//! catch-all response, so tests and clients can branch on the machine code
//! without parsing messages. Bodies stay generic; causes are logged
//! server-side where the error is produced.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::codec::CodecError;

/// Why a login was rejected and the account deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncompleteReason {
    NoRecovery,
    NoTwoFactor,
}

impl IncompleteReason {
    /// Stable machine code carried in the response body.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::NoRecovery => "no_recovery",
            Self::NoTwoFactor => "no_2fa",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("conflict")]
    Conflict,
    #[error("too many attempts")]
    RateLimited,
    /// Malformed byte map, bad file suffix, oversized file. Carries the
    /// status because file validation answers 422/413 rather than plain 400.
    #[error("invalid input")]
    InvalidInput {
        status: StatusCode,
        code: &'static str,
    },
    /// Login precondition failed; the account was deleted as a side effect.
    #[error("account incomplete")]
    AccountIncomplete(IncompleteReason),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// JSON error body: generic message plus a stable machine code.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn missing_payload() -> Self {
        Self::InvalidInput {
            status: StatusCode::BAD_REQUEST,
            code: "missing_payload",
        }
    }

    /// Bad byte-map payloads surface as 400 with a dedicated code.
    #[must_use]
    pub fn invalid_byte_map() -> Self {
        Self::InvalidInput {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_byte_map",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Conflict => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidInput { status, .. } => *status,
            Self::AccountIncomplete(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Conflict => "conflict",
            Self::RateLimited => "rate_limited",
            Self::InvalidInput { code, .. } => code,
            Self::AccountIncomplete(reason) => reason.code(),
            Self::Internal(_) => "internal",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::NotFound => "Not found".to_string(),
            Self::Unauthorized => "Unauthorized".to_string(),
            Self::Conflict => "Already exists".to_string(),
            Self::RateLimited => "Too many attempts. Try again later".to_string(),
            Self::InvalidInput { code, .. } => match *code {
                "invalid_file_type" => "Invalid file type".to_string(),
                "too_large" => "Content too large".to_string(),
                _ => "Invalid request".to_string(),
            },
            Self::AccountIncomplete(reason) => match reason {
                IncompleteReason::NoRecovery => {
                    "Recovery secret is not set up for this user. Account will be deleted"
                        .to_string()
                }
                IncompleteReason::NoTwoFactor => {
                    "2FA is not set up for this user. Account will be deleted".to_string()
                }
            },
            // Internal detail never reaches the client.
            Self::Internal(_) => "Internal error".to_string(),
        }
    }
}

impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::InvalidStoredHex => Self::Internal(err.into()),
            _ => Self::invalid_byte_map(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if let Self::Internal(err) = &self {
            tracing::error!("internal error: {err:#}");
        }
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_expected_status_codes() {
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::invalid_byte_map().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::AccountIncomplete(IncompleteReason::NoRecovery).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn incomplete_reasons_have_distinct_codes() {
        assert_eq!(
            ApiError::AccountIncomplete(IncompleteReason::NoRecovery).code(),
            "no_recovery"
        );
        assert_eq!(
            ApiError::AccountIncomplete(IncompleteReason::NoTwoFactor).code(),
            "no_2fa"
        );
    }

    #[test]
    fn codec_errors_become_client_errors_except_stored_hex() {
        let err: ApiError = CodecError::NonNumericIndex("x".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "invalid_byte_map");

        let err: ApiError = CodecError::InvalidStoredHex.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let err = ApiError::Internal(anyhow::anyhow!("dsn=postgres://secret"));
        assert_eq!(err.code(), "internal");
        assert!(!err.message().contains("secret"));
    }
}
