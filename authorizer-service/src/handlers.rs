use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use authorizer_auth::{AuthorizationDecision, ErrorKind, TokenVerifier};
use authorizer_observability::{AuthorizerMetrics, CONTENT_TYPE};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::app::AppState;

/// Gateway authorizer event. Only the token-bearing fields are read.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorizerRequest {
    pub authorization_token: Option<String>,
    pub identity_source: Option<IdentitySource>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IdentitySource {
    One(String),
    Many(Vec<String>),
}

impl AuthorizerRequest {
    /// First non-empty token candidate with any `Bearer ` prefix removed.
    pub fn token(&self) -> Option<&str> {
        let from_identity = match &self.identity_source {
            Some(IdentitySource::One(value)) => Some(value.as_str()),
            Some(IdentitySource::Many(values)) => values.first().map(String::as_str),
            None => None,
        };
        let from_header = self
            .headers
            .iter()
            .flatten()
            .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.as_str());

        [self.authorization_token.as_deref(), from_identity, from_header]
            .into_iter()
            .flatten()
            .map(strip_bearer)
            .find(|token| !token.is_empty())
    }
}

pub fn strip_bearer(value: &str) -> &str {
    let value = value.trim();
    match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => value,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    pub is_authorized: bool,
    pub context: ResponseContext,
}

#[derive(Debug, Serialize)]
pub struct ResponseContext {
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl From<AuthorizationDecision> for AuthorizerResponse {
    fn from(decision: AuthorizationDecision) -> Self {
        Self {
            is_authorized: decision.allowed,
            context: ResponseContext {
                reason: decision.reason,
                sub: decision.subject,
            },
        }
    }
}

pub async fn authorize(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<AuthorizerResponse> {
    // an unreadable event is treated as carrying no token
    let request: AuthorizerRequest = serde_json::from_slice(&body).unwrap_or_else(|err| {
        debug!(error = %err, "Authorizer event is not valid JSON");
        AuthorizerRequest::default()
    });
    let decision = match request.token() {
        Some(token) => timed_decision(&state.verifier, &state.metrics, token).await,
        None => AuthorizationDecision::deny(ErrorKind::EmptyToken.reason_code()),
    };

    state.metrics.decision(decision.allowed, decision.reason);
    if decision.allowed {
        info!(outcome = "allow", "Authorization decision");
    } else {
        info!(outcome = "deny", reason = decision.reason, "Authorization decision");
    }
    Json(decision.into())
}

async fn timed_decision(
    verifier: &TokenVerifier,
    metrics: &AuthorizerMetrics,
    token: &str,
) -> AuthorizationDecision {
    let started = Instant::now();
    let decision = verifier.authorize(token).await;
    metrics.observe_verify(started.elapsed().as_secs_f64());
    decision
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn metrics_endpoint(State(metrics): State<Arc<AuthorizerMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            error!(error = %err, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
