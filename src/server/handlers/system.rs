use axum::Json;
use chrono::Utc;
use serde_json::{Value, json};

use crate::error::GatewayError;
use crate::server::envelopes::HealthResponse;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "service": "AI Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "chat_completions": "/ai/chat/completions",
            "complete": "/ai/complete",
            "generate": "/ai/generate",
            "model_info": "/ai/model-info"
        }
    }))
}

pub async fn method_not_allowed() -> GatewayError {
    GatewayError::MethodNotAllowed
}

pub async fn not_found() -> GatewayError {
    GatewayError::NotFound
}
