use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Prometheus series for authorization decisions and key refreshes.
#[derive(Clone)]
pub struct AuthorizerMetrics {
    registry: Registry,
    decisions: IntCounterVec,
    key_refreshes: IntCounterVec,
    verify_duration_seconds: Histogram,
}

impl AuthorizerMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new(
                "authorizer_decisions_total",
                "Authorization decisions grouped by outcome and reason",
            ),
            &["outcome", "reason"],
        )?;
        registry.register(Box::new(decisions.clone()))?;

        let key_refreshes = IntCounterVec::new(
            Opts::new(
                "authorizer_jwks_refresh_total",
                "Signing key refresh attempts grouped by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(key_refreshes.clone()))?;

        let verify_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "authorizer_verify_duration_seconds",
                "Time spent verifying a single token",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(verify_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            decisions,
            key_refreshes,
            verify_duration_seconds,
        })
    }

    pub fn decision(&self, allowed: bool, reason: &str) {
        let outcome = if allowed { "allow" } else { "deny" };
        self.decisions.with_label_values(&[outcome, reason]).inc();
    }

    /// `result` is `ok` or an error reason code.
    pub fn key_refresh(&self, result: &str) {
        self.key_refreshes.with_label_values(&[result]).inc();
    }

    pub fn observe_verify(&self, seconds: f64) {
        self.verify_duration_seconds.observe(seconds);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every registered series.
    pub fn render(&self) -> prometheus::Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}
