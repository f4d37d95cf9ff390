use axum::{
    Router,
    routing::{any, get, post},
};
use std::sync::Arc;

use crate::config::RouteQuotas;
use crate::server::AppState;
use crate::server::middleware::Pipeline;

mod ai;
mod system;

/// Every route, including the catch-all, goes through the same pipeline with
/// its own quota. Wrong verbs hit the 405 fallback inside the pipeline.
pub fn routes(pipeline: &Pipeline, quotas: &RouteQuotas) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/ai/chat/completions",
            pipeline.wrap(
                post(ai::chat_completions).fallback(system::method_not_allowed),
                quotas.ai,
            ),
        )
        .route(
            "/ai/complete",
            pipeline.wrap(
                post(ai::complete).fallback(system::method_not_allowed),
                quotas.ai,
            ),
        )
        .route(
            "/ai/generate",
            pipeline.wrap(
                post(ai::generate).fallback(system::method_not_allowed),
                quotas.ai,
            ),
        )
        .route(
            "/ai/model-info",
            pipeline.wrap(
                get(ai::model_info).fallback(system::method_not_allowed),
                quotas.model_info,
            ),
        )
        .route(
            "/health",
            pipeline.wrap(
                get(system::health).fallback(system::method_not_allowed),
                quotas.health,
            ),
        )
        .route(
            "/",
            pipeline.wrap(
                get(system::index).fallback(system::method_not_allowed),
                quotas.index,
            ),
        )
        .fallback_service(pipeline.wrap::<()>(any(system::not_found), quotas.index))
}
