pub mod dispatcher;
pub mod envelopes;
pub mod handlers;
pub mod identity;
pub mod middleware;
#[cfg(test)]
pub(crate) mod test_support;

use crate::admission::AdmissionControl;
use crate::backend::BackendClient;
use crate::config::Settings;
use crate::error::Result as AppResult;
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use self::dispatcher::Dispatcher;
use self::identity::IdentityPolicy;
use self::middleware::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// Wires handlers, the admission pipeline and the backend client together.
/// The caller owns `admission` and decides when its reclaimer runs.
pub fn create_app(config: Settings, admission: &AdmissionControl) -> AppResult<Router> {
    let backend = BackendClient::new(&config.backend)?;
    tracing::info!(
        "Forwarding to LLM backend at {} (model: {}, timeout: {:?})",
        backend.base_url(),
        config.backend.model,
        config.backend.timeout()
    );

    let dispatcher = Arc::new(Dispatcher::new(backend, config.backend.model.clone()));
    let pipeline = Pipeline::new(
        admission.limiter(),
        IdentityPolicy::from_config(&config.rate_limit),
    );

    let quotas = &config.rate_limit.quotas;
    tracing::info!(
        "Rate limits per client per {}s: ai={}, model_info={}, health={}, index={}",
        config.rate_limit.window_secs,
        quotas.ai,
        quotas.model_info,
        quotas.health,
        quotas.index
    );
    if !config.rate_limit.trust_forwarded_headers {
        tracing::info!("Proxy headers ignored; clients keyed by transport address");
    } else if config.rate_limit.trusted_proxies.is_empty() {
        tracing::warn!("X-Forwarded-For / X-Real-IP are trusted from any peer");
    }

    let routes = handlers::routes(&pipeline, quotas);
    let app_state = AppState { dispatcher };

    let app = routes
        .with_state(Arc::new(app_state))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    Ok(app)
}
