//! Relay failure signals and their HTTP shape

use axum::{
    body::Body,
    http::{Response, StatusCode, header},
    response::IntoResponse,
};
use thiserror::Error;

/// Errors the relay surfaces to its caller
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    /// Any verb other than POST on the proxy endpoint
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Body is not a JSON document
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Provider answered with a non-success status before streaming
    #[error("Upstream rejected request: {status}")]
    UpstreamRejected { status: StatusCode, body: String },

    /// The upstream call could not be made
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Convert to the HTTP response returned to the caller
    pub fn into_response(self) -> Response<Body> {
        let (status, body) = match self {
            RelayError::UpstreamRejected { status, body } => (status, body),
            RelayError::MethodNotAllowed(_) => (
                StatusCode::METHOD_NOT_ALLOWED,
                serde_json::json!({ "error": "Method Not Allowed" }).to_string(),
            ),
            RelayError::BadRequest(details) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "Bad Request", "details": details }).to_string(),
            ),
            RelayError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "Internal Server Error", "details": details })
                    .to_string(),
            ),
        };

        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap_or_else(|_| {
                let mut fallback = Response::new(Body::empty());
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            RelayError::MethodNotAllowed(_) => "method",
            RelayError::BadRequest(_) => "request",
            RelayError::UpstreamRejected { .. } => "upstream",
            RelayError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response<Body> {
        self.into_response()
    }
}
