//! HTTP mapping for gate rejections.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Gate rejections surfaced to HTTP callers.
///
/// Negative authentication outcomes map to 401 with distinct codes so
/// clients can tell "refresh your token" from "you were never logged
/// in"; authorization refusals map to 403; throttling to 429.
#[derive(Debug, Error)]
pub enum GateError {
    /// No usable credential on the request.
    #[error("Authentication required")]
    Unauthenticated,

    /// Credential expired; the caller should refresh it.
    #[error("Token expired")]
    TokenExpired,

    /// Credential signature did not verify.
    #[error("Invalid token")]
    InvalidToken,

    /// Authenticated but lacking a required permission.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Per-client quota exhausted for the current window.
    #[error("Rate limit exceeded")]
    RateLimited,
}

/// Error response body.
#[derive(Debug, Serialize)]
struct GateErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            Self::TokenExpired => (StatusCode::UNAUTHORIZED, "token_expired"),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            Self::PermissionDenied(_) => (StatusCode::FORBIDDEN, "permission_denied"),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        };

        let body = GateErrorResponse {
            error: self.to_string(),
            code,
        };

        (status, Json(body)).into_response()
    }
}
