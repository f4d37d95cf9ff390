//! Per-route request pipeline: CORS, then rate limiting, then the handler.
//!
//! CORS runs outermost so its headers also land on 429 responses, and so an
//! `OPTIONS` request is answered before it can touch the client's quota.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::Json;

use crate::admission::{RateDecision, RateLimiter};
use crate::error::ErrorResponse;
use crate::server::identity::{IdentityPolicy, resolve_client_identity};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";

pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_epoch_secs));
}

/// CORS stage. Any `OPTIONS` request ends here with 200.
pub async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

/// Rate-limit stage state: the shared limiter plus the quota of one route.
#[derive(Debug, Clone)]
pub struct QuotaGuard {
    limiter: Arc<RateLimiter>,
    policy: Arc<IdentityPolicy>,
    quota: u32,
}

pub async fn enforce_rate_limit(
    State(guard): State<QuotaGuard>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = resolve_client_identity(request.headers(), peer, &guard.policy);
    let decision = guard.limiter.check(&identity, guard.quota);

    if !decision.admitted {
        tracing::warn!(
            "Rate limit exceeded for client {} on {} (limit {})",
            identity,
            request.uri().path(),
            decision.limit
        );
        let body = ErrorResponse {
            error: "Rate limit exceeded".to_string(),
            code: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            message: "Too many requests. Please try again later.".to_string(),
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        apply_rate_limit_headers(response.headers_mut(), &decision);
        return response;
    }

    // Quota stays consumed whatever the handler does next.
    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Builds the fixed CORS -> rate-limit -> handler composition for routes.
#[derive(Debug, Clone)]
pub struct Pipeline {
    limiter: Arc<RateLimiter>,
    policy: Arc<IdentityPolicy>,
}

impl Pipeline {
    pub fn new(limiter: Arc<RateLimiter>, policy: IdentityPolicy) -> Self {
        Self {
            limiter,
            policy: Arc::new(policy),
        }
    }

    /// Wraps every method of `route` (including its fallback) with the
    /// pipeline, charging `quota` requests per window.
    pub fn wrap<S>(&self, route: MethodRouter<S>, quota: u32) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let guard = QuotaGuard {
            limiter: Arc::clone(&self.limiter),
            policy: Arc::clone(&self.policy),
            quota,
        };
        route
            .layer(middleware::from_fn_with_state(guard, enforce_rate_limit))
            .layer(middleware::from_fn(cors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::ClientWindowStore;
    use crate::server::identity::X_FORWARDED_FOR;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::routing::get;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        store: Arc<ClientWindowStore>,
        hits: Arc<AtomicUsize>,
    }

    fn harness(quota: u32) -> Harness {
        let store = Arc::new(ClientWindowStore::new());
        let limiter = Arc::new(RateLimiter::new(Arc::clone(&store), Duration::from_secs(60)));
        let pipeline = Pipeline::new(limiter, IdentityPolicy::new(true, Vec::new()));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let route = get(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                "ok"
            }
        });
        let app = Router::new().route("/thing", pipeline.wrap(route, quota));
        Harness { app, store, hits }
    }

    fn request(method: Method, client: &str) -> Request {
        axum::http::Request::builder()
            .method(method)
            .uri("/thing")
            .header(X_FORWARDED_FOR, client)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn admitted_requests_carry_quota_and_cors_headers() {
        let h = harness(3);
        let resp = h.app.clone().oneshot(request(Method::GET, "1.1.1.1")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[X_RATELIMIT_LIMIT], "3");
        assert_eq!(resp.headers()[X_RATELIMIT_REMAINING], "2");
        assert!(resp.headers().contains_key(X_RATELIMIT_RESET));
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOWED_METHODS);
        assert_eq!(h.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn denied_request_skips_handler_and_keeps_cors() {
        let h = harness(1);
        h.app.clone().oneshot(request(Method::GET, "1.1.1.1")).await.unwrap();
        let resp = h.app.clone().oneshot(request(Method::GET, "1.1.1.1")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[X_RATELIMIT_REMAINING], "0");
        assert_eq!(resp.headers()[X_RATELIMIT_LIMIT], "1");
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(h.hits.load(Ordering::SeqCst), 1);

        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.code, 429);
        assert_eq!(body.error, "Rate limit exceeded");
    }

    #[tokio::test]
    async fn preflight_never_consumes_quota() {
        let h = harness(1);
        for _ in 0..5 {
            let resp = h.app.clone().oneshot(request(Method::OPTIONS, "1.1.1.1")).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOWED_HEADERS);
            assert!(!resp.headers().contains_key(X_RATELIMIT_LIMIT));
        }
        assert!(h.store.is_empty());
        assert_eq!(h.hits.load(Ordering::SeqCst), 0);

        let resp = h.app.clone().oneshot(request(Method::GET, "1.1.1.1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn clients_do_not_share_quota() {
        let h = harness(1);
        let a = h.app.clone().oneshot(request(Method::GET, "1.1.1.1")).await.unwrap();
        let b = h.app.clone().oneshot(request(Method::GET, "2.2.2.2")).await.unwrap();
        assert_eq!(a.status(), StatusCode::OK);
        assert_eq!(b.status(), StatusCode::OK);
        assert_eq!(h.store.len(), 2);
    }
}
