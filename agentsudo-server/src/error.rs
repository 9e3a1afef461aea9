//! Error types for the agentsudo server adapter.

use agentsudo_core::PermissionDenied;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Errors returned to HTTP clients by the agentsudo middleware.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The request carries no usable agent identity.
    #[error("{0}")]
    Unauthorized(String),

    /// The agent is known but may not perform the request.
    #[error("{0}")]
    Forbidden(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PermissionDenied> for ServerError {
    fn from(err: PermissionDenied) -> Self {
        if err.is_no_session() || err.is_expired() {
            ServerError::Unauthorized(err.to_string())
        } else {
            ServerError::Forbidden(err.to_string())
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
