use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::claims::{Claims, ClaimsCheck, ClaimsValidator};
use crate::clock::{Clock, SystemClock};
use crate::config::VerifierConfig;
use crate::decision::AuthorizationDecision;
use crate::error::{VerificationError, VerificationResult};
use crate::jwks::{JwksFetcher, KeySource, StaticKeySource};
use crate::keys::{KeySet, SigningKey};
use crate::provider::KeySetProvider;
use crate::signature::SignatureVerifier;
use crate::token::CompactToken;

/// Minimum spacing between refreshes triggered by unknown `kid` values.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Result of a successful verification.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedToken {
    pub kid: String,
    pub algorithm: String,
    pub claims: Claims,
}

/// Composes key lookup, signature verification and the claims check.
///
/// Safe to share across threads; verification reads an immutable key set snapshot.
#[derive(Clone)]
pub struct TokenVerifier {
    config: VerifierConfig,
    keys: Arc<KeySetProvider>,
    signatures: SignatureVerifier,
    claims: Arc<dyn ClaimsCheck>,
    clock: Arc<dyn Clock>,
    min_refresh_interval: Duration,
}

impl TokenVerifier {
    /// Verifier over a fixed key set with the default claims policy.
    pub fn with_key_set(config: VerifierConfig, keys: KeySet) -> Self {
        Self::with_provider(config, Arc::new(KeySetProvider::fixed(keys)))
    }

    pub fn with_provider(config: VerifierConfig, keys: Arc<KeySetProvider>) -> Self {
        Self {
            signatures: SignatureVerifier::from_config(&config),
            claims: Arc::new(ClaimsValidator::from_config(&config)),
            clock: Arc::new(SystemClock),
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            config,
            keys,
        }
    }

    pub fn builder(config: VerifierConfig) -> TokenVerifierBuilder {
        TokenVerifierBuilder::new(config)
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn keys(&self) -> &Arc<KeySetProvider> {
        &self.keys
    }

    /// Verify a compact token against the current key set.
    pub fn verify(&self, token: &str) -> VerificationResult<VerifiedToken> {
        let result = self.verify_token(token);
        match &result {
            Ok(_) => debug!(outcome = "allow", "Verified token"),
            Err(err) => debug!(outcome = "deny", reason = err.reason_code(), "Rejected token"),
        }
        result
    }

    fn verify_token(&self, token: &str) -> VerificationResult<VerifiedToken> {
        let token = CompactToken::parse(token)?;
        let header = token.header()?;

        let keys = self.keys.current();
        let key = keys
            .find(&header.kid)
            .ok_or_else(|| VerificationError::KeyNotFound(header.kid.clone()))?;

        if !self.signatures.verify(&token, key) {
            return Err(VerificationError::SignatureInvalid);
        }

        // the payload is trusted from here on
        let claims = Claims::decode(token.payload_segment())?;
        self.claims.check(&claims, self.clock.now())?;

        Ok(VerifiedToken {
            kid: header.kid,
            algorithm: header.alg,
            claims,
        })
    }

    /// Like [`verify`](Self::verify), but an unknown `kid` triggers one throttled key
    /// refresh and a retry, so rotated keys are picked up without waiting for the
    /// periodic refresh.
    pub async fn verify_with_refresh(&self, token: &str) -> VerificationResult<VerifiedToken> {
        let observed = self.keys.generation();
        let kid = match self.verify(token) {
            Err(VerificationError::KeyNotFound(kid)) => kid,
            other => return other,
        };

        if let Err(err) = self.keys.refresh_if_stale(self.min_refresh_interval).await {
            warn!(
                reason = err.reason_code(),
                "Key refresh after unknown kid failed"
            );
        }
        // keys installed by any refresh, ours or a concurrent one, deserve a retry
        if self.keys.generation() != observed {
            self.verify(token)
        } else {
            Err(VerificationError::KeyNotFound(kid))
        }
    }

    /// Allow/deny answer for a gateway.
    pub async fn authorize(&self, token: &str) -> AuthorizationDecision {
        AuthorizationDecision::from_result(&self.verify_with_refresh(token).await)
    }

    /// Refetch keys from the configured source. Returns the active key count.
    pub async fn refresh_keys(&self) -> VerificationResult<usize> {
        self.keys.refresh().await
    }
}

pub struct TokenVerifierBuilder {
    config: VerifierConfig,
    source: Option<Arc<dyn KeySource>>,
    static_keys: Vec<SigningKey>,
    claims: Option<Arc<dyn ClaimsCheck>>,
    clock: Option<Arc<dyn Clock>>,
    min_refresh_interval: Duration,
}

impl TokenVerifierBuilder {
    fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            source: None,
            static_keys: Vec::new(),
            claims: None,
            clock: None,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    pub fn with_key_source(mut self, source: Arc<dyn KeySource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_jwks_url(self, url: impl Into<String>) -> Self {
        self.with_jwks_fetcher(JwksFetcher::new(url))
    }

    pub fn with_jwks_fetcher(self, fetcher: JwksFetcher) -> Self {
        self.with_key_source(Arc::new(fetcher))
    }

    /// Add a key served without any fetch. Ignored when a key source is set.
    pub fn with_signing_key(mut self, key: SigningKey) -> Self {
        self.static_keys.push(key);
        self
    }

    pub fn with_rsa_pem(self, kid: impl Into<String>, pem: &[u8]) -> VerificationResult<Self> {
        let key = SigningKey::from_rsa_pem(kid, pem)?;
        Ok(self.with_signing_key(key))
    }

    /// Replace the default [`ClaimsValidator`].
    pub fn with_claims_check(mut self, check: Arc<dyn ClaimsCheck>) -> Self {
        self.claims = Some(check);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Load the initial key set and assemble the verifier.
    pub async fn build(self) -> VerificationResult<TokenVerifier> {
        let source: Arc<dyn KeySource> = match self.source {
            Some(source) => {
                if !self.static_keys.is_empty() {
                    warn!("Static signing keys ignored because a key source is configured");
                }
                source
            }
            None => {
                if self.static_keys.is_empty() {
                    warn!("No signing keys configured; every token will be rejected");
                }
                Arc::new(StaticKeySource::new(KeySet::new(self.static_keys)?))
            }
        };
        let provider = KeySetProvider::load(source).await?;

        let mut verifier = TokenVerifier::with_provider(self.config, Arc::new(provider));
        if let Some(check) = self.claims {
            verifier.claims = check;
        }
        if let Some(clock) = self.clock {
            verifier.clock = clock;
        }
        verifier.min_refresh_interval = self.min_refresh_interval;
        Ok(verifier)
    }
}
