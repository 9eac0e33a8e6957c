use std::sync::Arc;

use anyhow::{Context, Result};
use authorizer_auth::{JwksFetcher, TokenVerifier};
use authorizer_observability::AuthorizerMetrics;
use axum::extract::FromRef;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{AuthorizerConfig, KeySourceConfig};
use crate::handlers::{authorize, health, metrics_endpoint};

/// Key id given to the development PEM key.
pub const DEV_KEY_ID: &str = "local-dev";

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<TokenVerifier>,
    pub metrics: Arc<AuthorizerMetrics>,
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl FromRef<AppState> for Arc<AuthorizerMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/authorize", post(authorize))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Build the verifier and load its first key set.
pub async fn build_verifier(config: &AuthorizerConfig) -> Result<TokenVerifier> {
    let builder = TokenVerifier::builder(config.verifier.clone())
        .with_min_refresh_interval(config.min_refresh_interval);

    let builder = match &config.key_source {
        KeySourceConfig::Jwks { url } => {
            info!(jwks_url = %url, "Configuring JWKS fetcher");
            builder.with_jwks_fetcher(
                JwksFetcher::new(url.clone()).with_timeout(config.jwks_timeout),
            )
        }
        KeySourceConfig::DevPem { pem } => {
            info!(kid = DEV_KEY_ID, "Using development public key");
            builder
                .with_rsa_pem(DEV_KEY_ID, pem.as_bytes())
                .context("Failed to parse JWT_DEV_PUBLIC_KEY_PEM")?
        }
    };

    let verifier = builder
        .build()
        .await
        .context("Failed to load initial signing keys")?;
    info!(
        keys = verifier.keys().current().len(),
        source = %verifier.keys().source().describe(),
        "Token verifier ready"
    );
    Ok(verifier)
}
