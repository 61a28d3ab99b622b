//! Protocol-level error types.
//!
//! These cover failures that abort an entire upload request (bad JSON,
//! unknown route, rate limiting). Per-file failures are not errors at this
//! level: they are reported inside a 200 response as unsuccessful entries in
//! the `results` array.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard error response body.
///
/// `success` is always `false`; it is kept on the wire so clients can branch
/// on a single field for both success and failure envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Human-readable error message
    pub error: String,
    /// Error code for programmatic handling
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
            code: code.into(),
        }
    }
}

/// Errors that fail a request before (or instead of) per-file processing.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unknown upload route: {0}")]
    UnknownRoute(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Too many upload requests, retry later")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::UnknownRoute(_) => "UnknownRoute",
            ProtocolError::InvalidRequest(_) => "InvalidRequest",
            ProtocolError::RateLimited => "RateLimited",
            ProtocolError::Internal(_) => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProtocolError::UnknownRoute(_) => StatusCode::NOT_FOUND,
            ProtocolError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProtocolError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ProtocolError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.code(), self.to_string())
    }
}

impl IntoResponse for ProtocolError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_response())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_status() {
        let err = ProtocolError::UnknownRoute("ghost".into());
        assert_eq!(err.code(), "UnknownRoute");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = ProtocolError::InvalidRequest("missing action".into());
        assert_eq!(err.code(), "InvalidRequest");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        assert_eq!(ProtocolError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_error_response_shape() {
        let body = ProtocolError::UnknownRoute("ghost".into()).to_response();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "UnknownRoute");
        assert!(json["error"].as_str().unwrap().contains("ghost"));
    }
}
