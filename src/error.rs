//! Error types for mincore
//!
//! All errors in the node are converted to `AppError`,
//! which implements `IntoResponse` for the inbox and actor endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::federation::ValidationError;

/// Node-wide error type
///
/// Inbound handlers map each variant to a status code; background
/// loops inspect the variant to decide between retry, eviction and
/// giving up.
#[derive(Debug, Error)]
pub enum AppError {
    /// GET on anything but the local actor id (404)
    #[error("Resource not found")]
    NotFound,

    /// POST to anything but the local inbox (403)
    #[error("Access denied")]
    Forbidden,

    /// Unrecognized activity type or malformed field (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payload failed schema validation (500)
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Connection refused, timeout or other transport failure (500)
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Remote answered with a non-success status (500)
    #[error("{url} responded with HTTP {status}")]
    HttpStatus { url: String, status: StatusCode },

    /// Configuration or schema compilation error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for failures worth retrying: the peer could not be reached at all.
    ///
    /// A response timeout is not transient: the request may already have
    /// been delivered. Connect timeouts are reported as connect errors.
    pub fn is_transient(&self) -> bool {
        self.is_connection_error()
    }

    /// True when the peer was unreachable, as opposed to having answered badly.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, AppError::Transport(error) if error.is_connect())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_)
            | AppError::Transport(_)
            | AppError::HttpStatus { .. }
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        match (err.status(), err.url()) {
            (Some(status), Some(url)) => AppError::HttpStatus {
                url: url.to_string(),
                status,
            },
            _ => AppError::Transport(err),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Server-side failures are logged in full; the peer only ever sees
    /// a generic message for them.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status_code();
        let error_message = if status.is_server_error() {
            tracing::error!(error = %self, details = ?self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
