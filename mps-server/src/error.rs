//! Error types for mps-server
//!
//! Every failure leaves the service as an [`ApiError`] and is rendered as the
//! envelope `{error, cache_expired}`. `cache_expired` is true only for
//! [`ApiError::CacheExpired`]; clients use it to decide whether to recompute.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheError;
use crate::source::SourceError;
use mps_profile::ProfileError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range request parameter (400)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No artifact for this session; recompute first (404)
    #[error("{0}")]
    CacheExpired(String),

    /// Engine could not produce a result for valid input (422)
    #[error("Computation failed: {0}")]
    ComputationFailed(String),

    /// Encoded artifact exceeds the cache limit (413)
    #[error("Artifact of {size} bytes exceeds the {max} byte cache limit")]
    CacheWriteRejected { size: usize, max: usize },

    /// Request deadline or store round trip exceeded (504)
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Artifact store unreachable (503)
    #[error("Artifact store unavailable: {0}")]
    StoreUnavailable(String),

    /// Series could not be loaded (502)
    #[error("Series source unavailable: {0}")]
    SourceUnavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::CacheExpired(_) => StatusCode::NOT_FOUND,
            ApiError::ComputationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::CacheWriteRejected { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::SourceUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn cache_expired(&self) -> bool {
        matches!(self, ApiError::CacheExpired(_))
    }
}

/// Failure body returned by every endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub cache_expired: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorEnvelope {
            error: self.to_string(),
            cache_expired: self.cache_expired(),
        });

        (status, body).into_response()
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        ApiError::ComputationFailed(err.to_string())
    }
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        ApiError::SourceUnavailable(err.to_string())
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::TooLarge { size, max } => ApiError::CacheWriteRejected { size, max },
            CacheError::Timeout(limit) => {
                ApiError::Timeout(format!("artifact store did not answer within {limit:?}"))
            }
            CacheError::Store(e) => ApiError::StoreUnavailable(e.to_string()),
            CacheError::Encode(e) => ApiError::ComputationFailed(format!("artifact encoding failed: {e}")),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidParameter(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidParameter(rejection.body_text())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::InvalidParameter("k".into()), StatusCode::BAD_REQUEST, false),
            (ApiError::CacheExpired("gone".into()), StatusCode::NOT_FOUND, true),
            (ApiError::ComputationFailed("k".into()), StatusCode::UNPROCESSABLE_ENTITY, false),
            (
                ApiError::CacheWriteRejected { size: 10, max: 5 },
                StatusCode::PAYLOAD_TOO_LARGE,
                false,
            ),
            (ApiError::Timeout("slow".into()), StatusCode::GATEWAY_TIMEOUT, false),
            (ApiError::StoreUnavailable("down".into()), StatusCode::SERVICE_UNAVAILABLE, false),
            (ApiError::SourceUnavailable("gone".into()), StatusCode::BAD_GATEWAY, false),
        ];

        for (err, status, expired) in cases {
            assert_eq!(err.status(), status, "{err}");
            assert_eq!(err.cache_expired(), expired, "{err}");
        }
    }

    #[test]
    fn test_cache_errors_map_to_distinct_kinds() {
        let too_large = ApiError::from(CacheError::TooLarge { size: 2, max: 1 });
        assert!(matches!(too_large, ApiError::CacheWriteRejected { size: 2, max: 1 }));

        let down = ApiError::from(CacheError::Store(StoreError::Unavailable("refused".into())));
        assert!(matches!(down, ApiError::StoreUnavailable(_)));

        let slow = ApiError::from(CacheError::Timeout(std::time::Duration::from_millis(5)));
        assert!(matches!(slow, ApiError::Timeout(_)));
    }

    #[test]
    fn test_profile_errors_are_computation_failures() {
        let err = ApiError::from(ProfileError::NotEnoughMotifs {
            requested: 3,
            found: 1,
        });
        assert!(matches!(err, ApiError::ComputationFailed(_)));
        assert!(!err.cache_expired());
    }
}
