use chrono::Utc;
use serde_json::Value;

use crate::backend::types::{ChatBackendRequest, PromptBackendRequest, extract_content};
use crate::backend::{BackendClient, Operation};
use crate::error::{GatewayError, Result};
use crate::server::envelopes::{ChatCompletionRequest, GenerationResponse, PromptRequest};

pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Sampling parameters after default injection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl GenerationParams {
    /// Omitted and zero values both mean "use the default".
    pub fn resolve(max_tokens: Option<u32>, temperature: Option<f64>) -> Self {
        Self {
            max_tokens: max_tokens.filter(|&v| v != 0).unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: temperature
                .filter(|&v| v != 0.0)
                .unwrap_or(DEFAULT_TEMPERATURE),
        }
    }
}

/// Turns validated gateway requests into single backend calls and reshapes
/// the answers. Request-scoped state lives on the stack; dropping the
/// returned future aborts the in-flight backend call.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    backend: BackendClient,
    model: String,
}

impl Dispatcher {
    pub fn new(backend: BackendClient, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    pub async fn chat_completion(&self, request: ChatCompletionRequest) -> Result<GenerationResponse> {
        if request.messages.is_empty() {
            return Err(GatewayError::InvalidInput("Messages cannot be empty".into()));
        }
        let params = GenerationParams::resolve(request.max_tokens, request.temperature);
        tracing::info!(
            "chat_completion: user {} with {} messages",
            request.user_id.as_deref().unwrap_or("-"),
            request.messages.len()
        );

        let body = ChatBackendRequest {
            messages: request.messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };
        let text = self.call_for_text(Operation::ChatCompletion, &body).await?;
        Ok(self.envelope(text, request.user_id))
    }

    pub async fn complete(&self, request: PromptRequest) -> Result<GenerationResponse> {
        self.prompt_operation(Operation::Complete, request).await
    }

    pub async fn generate(&self, request: PromptRequest) -> Result<GenerationResponse> {
        self.prompt_operation(Operation::Generate, request).await
    }

    /// Backend model metadata, passed through as-is.
    pub async fn model_info(&self) -> Result<Value> {
        let value = self.backend.get_json(Operation::ModelInfo).await?;
        if !value.is_object() {
            return Err(GatewayError::MalformedResponse {
                summary: Operation::ModelInfo.failure_summary(),
                detail: "model info is not a JSON object".into(),
            });
        }
        Ok(value)
    }

    async fn prompt_operation(
        &self,
        operation: Operation,
        request: PromptRequest,
    ) -> Result<GenerationResponse> {
        if request.prompt.trim().is_empty() {
            return Err(GatewayError::InvalidInput("Prompt cannot be empty".into()));
        }
        let params = GenerationParams::resolve(request.max_tokens, request.temperature);
        tracing::info!(
            "{}: user {}",
            operation,
            request.user_id.as_deref().unwrap_or("-")
        );

        let body = PromptBackendRequest {
            prompt: request.prompt,
            max_length: params.max_tokens,
            temperature: params.temperature,
            do_sample: true,
        };
        let text = self.call_for_text(operation, &body).await?;
        Ok(self.envelope(text, request.user_id))
    }

    async fn call_for_text<T: serde::Serialize>(&self, operation: Operation, body: &T) -> Result<String> {
        let value = self.backend.post_json(operation, body).await?;
        extract_content(&value, operation).ok_or_else(|| {
            let detail = match operation.content_fields() {
                Some((primary, fallback)) => {
                    format!("neither `{}` nor `{}` present", primary, fallback)
                }
                None => format!("{} has no text field", operation),
            };
            GatewayError::MalformedResponse {
                summary: operation.failure_summary(),
                detail,
            }
        })
    }

    fn envelope(&self, response: String, user_id: Option<String>) -> GenerationResponse {
        GenerationResponse {
            response,
            user_id: user_id.filter(|id| !id.is_empty()),
            timestamp: Utc::now(),
            model: self.model.clone(),
        }
    }
}
