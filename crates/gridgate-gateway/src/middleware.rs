//! Per-client rate limiting in front of the application's router.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request, header::AUTHORIZATION, header::RETRY_AFTER},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use gridgate_core::{RateDecision, resolve_client_key};

use crate::error::GateError;
use crate::state::GateState;

/// Forwarded-address header consulted before the connection address.
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Attach the rate-limit middleware to `router`.
///
/// ```ignore
/// let app = Router::new().route("/api/v1/games", get(list_games));
/// let app = middleware::apply(app, gate.clone());
/// ```
pub fn apply<S>(router: Router<S>, gate: Arc<GateState>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(gate, rate_limit))
}

/// Rate-limit middleware.
///
/// Resolves the throttling key (the caller's identity when the bearer
/// credential verifies, else the first forwarded address, else the
/// connection address) and asks the limiter for a decision. Every
/// response carries the `X-RateLimit-*` quota headers; rejections answer
/// 429 with `Retry-After`.
pub async fn rate_limit(
    State(gate): State<Arc<GateState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let principal = gate.authenticate(header).into_principal();

    let forwarded = request
        .headers()
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok());
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let key = resolve_client_key(principal.as_ref(), forwarded, remote.as_deref());
    let decision = gate.limiter.check(&key);

    if !decision.allowed {
        tracing::warn!(client = %key, "rate limit exceeded");
        return throttled(&decision);
    }

    let mut response = next.run(request).await;
    quota_headers(response.headers_mut(), &decision);
    response
}

fn throttled(decision: &RateDecision) -> Response {
    let mut response = GateError::RateLimited.into_response();
    quota_headers(response.headers_mut(), decision);

    let wait = decision.retry_after();
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(secs));

    response
}

fn quota_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert(
        "x-ratelimit-reset",
        HeaderValue::from(decision.reset_at.timestamp()),
    );
}
