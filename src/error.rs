//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{StatusCode, header::InvalidHeaderValue},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur while relaying a request.
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Transport Errors**: The aggregator could not be reached or timed out
/// - **Upstream Errors**: The aggregator answered with a non-success status
/// - **Shape Errors**: The aggregator answered with a body we cannot interpret
/// - **Validation Errors**: Invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Outbound HTTP call failed before a response arrived (connect error, timeout).
    ///
    /// This wraps any reqwest::Error using the `#[from]` attribute.
    #[error("Aggregator request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Aggregator responded with a non-2xx status.
    ///
    /// Client errors are passed through verbatim, server errors are masked.
    #[error("Aggregator responded with status {status}")]
    Upstream {
        status: StatusCode,
        body: serde_json::Value,
    },

    /// Aggregator response failed structural validation.
    #[error("Unexpected aggregator response: {0}")]
    UnexpectedResponse(#[source] serde_json::Error),

    /// The request ran past its total latency budget.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

impl AppError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Timeouts, connection failures and aggregator 5xx/408/429 responses qualify.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Transport(e) => e.is_timeout() || e.is_connect(),
            AppError::Upstream { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// Errors raised by this service return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Aggregator client errors (4xx) are the exception: their status and body are
/// returned untouched so the caller sees exactly what the aggregator said.
///
/// # Status Code Mapping
///
/// - `InvalidRequest` → 400 Bad Request
/// - `Upstream` → aggregator's status (body masked for 5xx)
/// - `Transport` → 502 Bad Gateway
/// - `UnexpectedResponse` → 500 Internal Server Error (hides details from client)
/// - `DeadlineExceeded` → 504 Gateway Timeout
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Upstream { status, ref body } if status.is_client_error() => {
                tracing::warn!(status = status.as_u16(), "aggregator rejected request");
                return (status, Json(body.clone())).into_response();
            }
            AppError::Upstream { status, ref body } => {
                tracing::error!(status = status.as_u16(), body = %body, "aggregator server error");
                (
                    status,
                    "upstream_error",
                    "The aggregator failed to process the request".to_string(),
                )
            }
            AppError::Transport(ref e) => {
                tracing::error!("Aggregator unreachable: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_unreachable",
                    "The aggregator could not be reached".to_string(),
                )
            }
            AppError::UnexpectedResponse(ref e) => {
                tracing::error!("Unexpected aggregator response: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::DeadlineExceeded => (
                StatusCode::GATEWAY_TIMEOUT,
                "deadline_exceeded",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// Malformed or incomplete JSON bodies use the same 400 shape as field validation.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Errors raised while building the process-wide aggregator client at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid aggregator base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("Invalid value for header {name}")]
    InvalidHeader {
        name: &'static str,
        #[source]
        source: InvalidHeaderValue,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
