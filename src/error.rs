use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Not found")]
    NotFound,

    /// Transport failure talking to the backend. `summary` is the public message.
    #[error("backend unavailable: {detail}")]
    BackendUnavailable { summary: &'static str, detail: String },

    #[error("backend timed out")]
    BackendTimeout { summary: &'static str },

    #[error("backend responded with status {status}")]
    BackendStatus {
        summary: &'static str,
        status: u16,
    },

    #[error("malformed backend response: {detail}")]
    MalformedResponse { summary: &'static str, detail: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Standard error body: `{error, code, message}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: status.as_u16(),
            message: message.into(),
        }
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Backend details stay in the logs; callers only see the summary.
    fn public_message(&self) -> String {
        match self {
            GatewayError::InvalidInput(msg) => msg.clone(),
            GatewayError::MethodNotAllowed => "Method not allowed".to_string(),
            GatewayError::NotFound => "The requested resource was not found".to_string(),
            GatewayError::BackendUnavailable { summary, .. }
            | GatewayError::BackendTimeout { summary }
            | GatewayError::BackendStatus { summary, .. }
            | GatewayError::MalformedResponse { summary, .. } => summary.to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        ErrorResponse::new(status, self.public_message()).into_response_with(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: GatewayError) -> (StatusCode, ErrorResponse) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn invalid_input_names_the_field() {
        let (status, body) =
            body_of(GatewayError::InvalidInput("Prompt cannot be empty".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, 400);
        assert_eq!(body.error, "Bad Request");
        assert_eq!(body.message, "Prompt cannot be empty");
    }

    #[tokio::test]
    async fn backend_failures_do_not_leak_details() {
        let (status, body) = body_of(GatewayError::BackendUnavailable {
            summary: "Failed to get completion",
            detail: "error sending request for url (http://10.0.0.7:8082/complete)".into(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Failed to get completion");
        assert!(!body.message.contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn method_not_allowed_is_405() {
        let (status, body) = body_of(GatewayError::MethodNotAllowed).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body.error, "Method Not Allowed");
    }
}
