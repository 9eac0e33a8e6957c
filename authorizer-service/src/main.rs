use std::sync::Arc;

use anyhow::Context;
use authorizer_observability::AuthorizerMetrics;
use authorizer_service::refresh::spawn_key_refresh;
use authorizer_service::{build_verifier, router, AppState, AuthorizerConfig};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AuthorizerConfig::from_env()?;
    let verifier = Arc::new(build_verifier(&config).await?);
    let metrics = Arc::new(AuthorizerMetrics::new().context("Failed to register metrics")?);

    if config.refreshes_keys() {
        info!(
            every_secs = config.refresh_interval.as_secs(),
            "Starting signing key refresh"
        );
        spawn_key_refresh(verifier.clone(), metrics.clone(), config.refresh_interval);
    }

    let app = router(AppState { verifier, metrics });

    let addr = config.listen_addr()?;
    info!(%addr, "starting authorizer-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
