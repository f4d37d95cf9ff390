use serde::Serialize;
use serde_json::Value;

use crate::config::BackendConfig;
use crate::error::{GatewayError, Result};
use crate::http_client::client_for_url_with_timeout;

use super::types::Operation;

const LOGGED_BODY_CHARS: usize = 256;

/// HTTP client for the language-model server. One request per call, no
/// retries; the configured timeout bounds the whole exchange.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = client_for_url_with_timeout(&config.base_url, config.timeout())?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, operation: Operation) -> String {
        format!("{}{}", self.base_url, operation.path())
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        operation: Operation,
        body: &T,
    ) -> Result<Value> {
        let builder = self
            .client
            .post(self.url(operation))
            .header("Content-Type", "application/json")
            .json(body);
        self.send(operation, builder).await
    }

    pub async fn get_json(&self, operation: Operation) -> Result<Value> {
        let builder = self.client.get(self.url(operation));
        self.send(operation, builder).await
    }

    async fn send(&self, operation: Operation, builder: reqwest::RequestBuilder) -> Result<Value> {
        tracing::debug!("{}: calling backend {}", operation, operation.path());

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport_error(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(LOGGED_BODY_CHARS).collect();
            tracing::warn!(
                "{}: backend responded with status {}: {}",
                operation,
                status,
                snippet
            );
            return Err(GatewayError::BackendStatus {
                summary: operation.failure_summary(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(operation, e))?;

        let value = serde_json::from_slice::<Value>(&bytes).map_err(|e| {
            GatewayError::MalformedResponse {
                summary: operation.failure_summary(),
                detail: format!("invalid JSON: {}", e),
            }
        })?;

        tracing::debug!("{}: backend responded with status {}", operation, status);
        Ok(value)
    }
}

fn classify_transport_error(operation: Operation, e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        tracing::warn!("{}: backend call timed out", operation);
        GatewayError::BackendTimeout {
            summary: operation.failure_summary(),
        }
    } else {
        tracing::warn!("{}: backend call failed: {}", operation, e);
        GatewayError::BackendUnavailable {
            summary: operation.failure_summary(),
            detail: e.to_string(),
        }
    }
}
