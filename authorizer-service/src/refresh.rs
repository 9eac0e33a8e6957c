use std::sync::Arc;
use std::time::Duration;

use authorizer_auth::TokenVerifier;
use authorizer_observability::AuthorizerMetrics;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Periodically refetch signing keys. A failed refresh keeps the previous keys.
pub fn spawn_key_refresh(
    verifier: Arc<TokenVerifier>,
    metrics: Arc<AuthorizerMetrics>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately and keys were loaded at startup
        ticker.tick().await;
        loop {
            ticker.tick().await;
            refresh_once(&verifier, &metrics).await;
        }
    })
}

pub async fn refresh_once(verifier: &TokenVerifier, metrics: &AuthorizerMetrics) {
    match verifier.refresh_keys().await {
        Ok(0) => {
            metrics.key_refresh("empty");
            debug!("Refresh returned no keys");
        }
        Ok(count) => {
            metrics.key_refresh("ok");
            debug!(count, "Refreshed signing keys");
        }
        Err(err) => {
            metrics.key_refresh(err.reason_code());
            warn!(error = %err, "Failed to refresh signing keys");
        }
    }
}
