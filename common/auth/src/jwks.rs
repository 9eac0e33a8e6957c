use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{VerificationError, VerificationResult};
use crate::keys::{KeySet, SigningKey};

/// Default bound on a single key-source request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Anything that can produce a complete key set.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn load(&self) -> VerificationResult<KeySet>;

    /// Short label for logs; never contains secrets.
    fn describe(&self) -> String;
}

/// Fetches a JWKS document over HTTPS.
#[derive(Clone)]
pub struct JwksFetcher {
    client: Client,
    url: String,
    timeout: Duration,
}

impl JwksFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Key endpoint of a Cognito user pool.
    pub fn cognito(region: &str, user_pool_id: &str) -> Self {
        Self::new(cognito_jwks_url(region, user_pool_id))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn fetch(&self) -> VerificationResult<KeySet> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| VerificationError::KeySourceUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(VerificationError::KeySourceUnavailable(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| VerificationError::KeySourceUnavailable(err.to_string()))?;

        parse_jwks(&body)
    }
}

#[async_trait]
impl KeySource for JwksFetcher {
    async fn load(&self) -> VerificationResult<KeySet> {
        self.fetch().await
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// A key set fixed at construction: pre-fetched documents, development PEM keys, tests.
#[derive(Debug, Clone)]
pub struct StaticKeySource {
    keys: KeySet,
}

impl StaticKeySource {
    pub fn new(keys: KeySet) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn load(&self) -> VerificationResult<KeySet> {
        Ok(self.keys.clone())
    }

    fn describe(&self) -> String {
        format!("static ({} keys)", self.keys.len())
    }
}

pub fn cognito_jwks_url(region: &str, user_pool_id: &str) -> String {
    format!("{}/.well-known/jwks.json", cognito_issuer(region, user_pool_id))
}

/// The `iss` value Cognito writes into tokens from this pool.
pub fn cognito_issuer(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
}

/// Parse a JWKS document into a key set.
///
/// Encryption keys and key types this verifier cannot use are skipped; anything
/// else that is incomplete fails the whole document.
pub fn parse_jwks(body: &[u8]) -> VerificationResult<KeySet> {
    let document: JwksResponse = serde_json::from_slice(body)
        .map_err(|err| VerificationError::KeySourceMalformed(err.to_string()))?;

    let mut keys = Vec::with_capacity(document.keys.len());
    for entry in document.keys.into_iter() {
        if let Some(key) = entry.into_signing_key()? {
            keys.push(key);
        }
    }

    KeySet::new(keys)
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkEntry>,
}

#[derive(Debug, Deserialize)]
struct JwkEntry {
    kid: Option<String>,
    kty: Option<String>,
    alg: Option<String>,
    #[serde(rename = "use")]
    key_use: Option<String>,
    n: Option<String>,
    e: Option<String>,
    crv: Option<String>,
    x: Option<String>,
    y: Option<String>,
}

impl JwkEntry {
    fn into_signing_key(self) -> VerificationResult<Option<SigningKey>> {
        let kid = self
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| VerificationError::KeySourceMalformed("key missing kid".into()))?;

        if self.key_use.as_deref().is_some_and(|value| value != "sig") {
            debug!(kid, "skipping non-signing key");
            return Ok(None);
        }

        let kty = self.kty.unwrap_or_else(|| "RSA".to_string());
        let key = match kty.as_str() {
            "RSA" => {
                let modulus = required(self.n, &kid, "n")?;
                let exponent = required(self.e, &kid, "e")?;
                SigningKey::from_rsa_components(kid.clone(), &modulus, &exponent)?
            }
            "EC" => {
                let curve = required(self.crv, &kid, "crv")?;
                let x = required(self.x, &kid, "x")?;
                let y = required(self.y, &kid, "y")?;
                SigningKey::from_ec_components(kid.clone(), &curve, &x, &y)?
            }
            "OKP" => {
                let curve = required(self.crv, &kid, "crv")?;
                if curve != "Ed25519" {
                    debug!(kid, curve, "skipping unsupported OKP curve");
                    return Ok(None);
                }
                let x = required(self.x, &kid, "x")?;
                SigningKey::from_ed_components(kid.clone(), &x)?
            }
            other => {
                debug!(kid, kty = other, "skipping unsupported key type");
                return Ok(None);
            }
        };

        match self.alg {
            Some(alg) => {
                let algorithm = Algorithm::from_str(&alg).map_err(|_| {
                    VerificationError::KeySourceMalformed(format!(
                        "key '{kid}' uses unknown alg '{alg}'"
                    ))
                })?;
                key.with_algorithm(algorithm).map(Some)
            }
            None => Ok(Some(key)),
        }
    }
}

fn required(value: Option<String>, kid: &str, member: &str) -> VerificationResult<String> {
    value.ok_or_else(|| {
        VerificationError::KeySourceMalformed(format!("key '{kid}' missing '{member}'"))
    })
}
