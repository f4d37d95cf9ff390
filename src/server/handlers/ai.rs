use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::server::AppState;
use crate::server::envelopes::{ChatCompletionRequest, GenerationResponse, PromptRequest};

// Bodies are decoded whatever the Content-Type, so `curl -d` clients work.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, GatewayError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        GatewayError::InvalidInput("Invalid JSON format".into())
    })
}

pub async fn chat_completions(
    State(app_state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<GenerationResponse>, GatewayError> {
    let request: ChatCompletionRequest = parse_body(&body)?;
    let response = app_state.dispatcher.chat_completion(request).await?;
    Ok(Json(response))
}

pub async fn complete(
    State(app_state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<GenerationResponse>, GatewayError> {
    let request: PromptRequest = parse_body(&body)?;
    let response = app_state.dispatcher.complete(request).await?;
    Ok(Json(response))
}

pub async fn generate(
    State(app_state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<GenerationResponse>, GatewayError> {
    let request: PromptRequest = parse_body(&body)?;
    let response = app_state.dispatcher.generate(request).await?;
    Ok(Json(response))
}

pub async fn model_info(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Value>, GatewayError> {
    Ok(Json(app_state.dispatcher.model_info().await?))
}
