//! Authentication extractors.
//!
//! Routes opt into authentication by taking [`RequireAuth`] (reject
//! anonymous callers) or [`OptionalAuth`] (anonymous allowed) as a
//! handler parameter.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};

use gridgate_core::{AuthOutcome, Principal, Role};

use crate::error::GateError;
use crate::state::GateState;

/// Extractor for routes that require an authenticated caller.
///
/// Rejects with 401 and a code of `unauthenticated`, `token_expired` or
/// `invalid_token` depending on the verification outcome.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    /// The verified principal.
    pub principal: Principal,
}

impl RequireAuth {
    /// Get the principal's ID.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.principal.id
    }

    /// Get the principal's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.principal.role
    }

    /// Check if the caller is an admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.principal.is_admin()
    }

    /// Require a capability, surfacing a 403 on refusal.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::PermissionDenied`] when the principal does
    /// not hold `permission`.
    pub fn require(&self, permission: &str) -> Result<(), GateError> {
        if self.principal.authorize(permission) {
            Ok(())
        } else {
            Err(GateError::PermissionDenied(format!(
                "{permission} required"
            )))
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    Arc<GateState>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<GateState>::from_ref(state);
        extract_auth(parts, &gate).map_err(IntoResponse::into_response)
    }
}

fn extract_auth(parts: &Parts, gate: &GateState) -> Result<RequireAuth, GateError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match gate.authenticate(header) {
        AuthOutcome::Authenticated(principal) => Ok(RequireAuth { principal }),
        AuthOutcome::Expired => Err(GateError::TokenExpired),
        AuthOutcome::Invalid => Err(GateError::InvalidToken),
        AuthOutcome::Unauthenticated => Err(GateError::Unauthenticated),
    }
}

/// Extractor for routes that allow anonymous access.
///
/// Never rejects: any negative verification outcome simply yields
/// `None`.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<RequireAuth>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
    Arc<GateState>: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(
            RequireAuth::from_request_parts(parts, state).await.ok(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{Router, body::Body, http::Request, http::StatusCode, routing::get};
    use tower::ServiceExt;

    use gridgate_core::{RateLimitPolicy, RateLimiter, TokenAuthenticator};

    const TTL: Duration = Duration::from_secs(3600);

    fn create_gate_with_ttl(ttl: Duration) -> Arc<GateState> {
        let secret = TokenAuthenticator::generate_secret();
        Arc::new(GateState::new(
            TokenAuthenticator::new(&secret, ttl),
            Arc::new(RateLimiter::new(RateLimitPolicy::default())),
        ))
    }

    fn create_gate() -> Arc<GateState> {
        create_gate_with_ttl(TTL)
    }

    async fn whoami(auth: RequireAuth) -> String {
        auth.user_id().to_string()
    }

    async fn save_lineup(auth: RequireAuth) -> Result<&'static str, GateError> {
        auth.require("write:lineup")?;
        Ok("saved")
    }

    async fn scoreboard(OptionalAuth(auth): OptionalAuth) -> String {
        auth.map_or_else(|| "anonymous".to_string(), |a| a.user_id().to_string())
    }

    fn app(gate: Arc<GateState>) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route("/lineup", get(save_lineup))
            .route("/scoreboard", get(scoreboard))
            .with_state(gate)
    }

    async fn get_response(
        app: Router,
        uri: &str,
        authorization: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_code(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["code"].as_str().unwrap().to_string()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_credential_is_401() {
        let response = get_response(app(create_gate()), "/whoami", None).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_code(response).await, "unauthenticated");
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let gate = create_gate();
        let token = gate
            .authenticator
            .issue_token("u_9", "fan@example.com", Role::User)
            .unwrap();

        let response =
            get_response(app(gate), "/whoami", Some(&format!("Bearer {token}"))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "u_9");
    }

    #[tokio::test]
    async fn test_expired_token_gets_distinct_code() {
        let gate = create_gate_with_ttl(Duration::ZERO);
        let token = gate
            .authenticator
            .issue_token("u_9", "fan@example.com", Role::User)
            .unwrap();

        // Zero TTL stamps exp = now; a moment later the token is stale.
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        let response =
            get_response(app(gate), "/whoami", Some(&format!("Bearer {token}"))).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_code(response).await, "token_expired");
    }

    #[tokio::test]
    async fn test_foreign_token_is_invalid() {
        let gate = create_gate();
        let impostor = create_gate();
        let token = impostor
            .authenticator
            .issue_token("u_9", "fan@example.com", Role::Admin)
            .unwrap();

        let response =
            get_response(app(gate), "/whoami", Some(&format!("Bearer {token}"))).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_code(response).await, "invalid_token");
    }

    #[tokio::test]
    async fn test_permission_gate() {
        let gate = create_gate();
        let reader = gate
            .authenticator
            .issue_token("u_1", "fan@example.com", Role::User)
            .unwrap();
        let analyst = gate
            .authenticator
            .issue_token("u_2", "desk@example.com", Role::Analyst)
            .unwrap();

        let denied = get_response(
            app(gate.clone()),
            "/lineup",
            Some(&format!("Bearer {reader}")),
        )
        .await;
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_code(denied).await, "permission_denied");

        let granted = get_response(
            app(gate),
            "/lineup",
            Some(&format!("Bearer {analyst}")),
        )
        .await;
        assert_eq!(granted.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_optional_auth_never_rejects() {
        let gate = create_gate();
        let token = gate
            .authenticator
            .issue_token("u_5", "fan@example.com", Role::User)
            .unwrap();

        let anonymous = get_response(app(gate.clone()), "/scoreboard", None).await;
        assert_eq!(anonymous.status(), StatusCode::OK);
        assert_eq!(body_text(anonymous).await, "anonymous");

        let garbage = get_response(app(gate.clone()), "/scoreboard", Some("Bearer junk")).await;
        assert_eq!(garbage.status(), StatusCode::OK);

        let known =
            get_response(app(gate), "/scoreboard", Some(&format!("Bearer {token}"))).await;
        assert_eq!(body_text(known).await, "u_5");
    }
}
