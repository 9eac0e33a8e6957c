use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use authorizer_auth::{cognito_issuer, cognito_jwks_url, Algorithm, AudienceClaim, VerifierConfig};

const DEFAULT_PORT: u16 = 8090;
const DEFAULT_JWKS_TIMEOUT_SECS: u64 = 5;
const DEFAULT_REFRESH_SECS: u64 = 300;
const MIN_REFRESH_SECS: u64 = 60;
const DEFAULT_MIN_REFRESH_SECS: u64 = 30;

/// Where signing keys come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySourceConfig {
    Jwks { url: String },
    /// Single static RSA key for local development.
    DevPem { pem: String },
}

#[derive(Debug, Clone)]
pub struct AuthorizerConfig {
    pub key_source: KeySourceConfig,
    pub verifier: VerifierConfig,
    pub jwks_timeout: Duration,
    pub refresh_interval: Duration,
    pub min_refresh_interval: Duration,
    pub host: String,
    pub port: u16,
}

impl AuthorizerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parse configuration from any key/value lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));
        let pool = match (var("USER_POOL_REGION"), var("USER_POOL_ID")) {
            (Some(region), Some(pool_id)) => Some((region, pool_id)),
            _ => None,
        };

        let key_source = if let Some(url) = var("JWT_JWKS_URL") {
            KeySourceConfig::Jwks { url }
        } else if let Some((region, pool_id)) = &pool {
            KeySourceConfig::Jwks {
                url: cognito_jwks_url(region, pool_id),
            }
        } else if let Some(pem) = var("JWT_DEV_PUBLIC_KEY_PEM") {
            KeySourceConfig::DevPem { pem }
        } else {
            return Err(anyhow!(
                "USER_POOL_REGION and USER_POOL_ID (or JWT_JWKS_URL) must be set"
            ));
        };

        let audiences = var("JWT_AUDIENCE")
            .or_else(|| var("USER_POOL_CLIENT_ID"))
            .map(|value| parse_list(&value))
            .unwrap_or_default();
        let mut audiences = audiences.into_iter();
        let first = audiences
            .next()
            .ok_or_else(|| anyhow!("USER_POOL_CLIENT_ID (or JWT_AUDIENCE) must be set"))?;
        let mut verifier = VerifierConfig::new(first);
        for audience in audiences {
            verifier = verifier.with_additional_audience(audience);
        }

        if let Some(value) = var("JWT_AUDIENCE_CLAIM") {
            let claim = AudienceClaim::parse(&value).ok_or_else(|| {
                anyhow!("Unsupported JWT_AUDIENCE_CLAIM '{value}'. Use aud, client_id, or any.")
            })?;
            verifier = verifier.with_audience_claim(claim);
        }

        if let Some(issuer) = var("JWT_ISSUER") {
            verifier = verifier.with_issuer(issuer);
        } else if flag(&var, "JWT_VALIDATE_ISSUER") {
            let (region, pool_id) = pool
                .as_ref()
                .ok_or_else(|| anyhow!("JWT_VALIDATE_ISSUER needs USER_POOL_REGION and USER_POOL_ID"))?;
            verifier = verifier.with_issuer(cognito_issuer(region, pool_id));
        }

        if let Some(value) = var("JWT_LEEWAY_SECONDS") {
            let leeway = value
                .parse::<u32>()
                .with_context(|| format!("Failed to parse JWT_LEEWAY_SECONDS '{value}'"))?;
            verifier = verifier.with_leeway(leeway);
        }

        if let Some(value) = var("JWT_ALLOWED_ALGORITHMS") {
            verifier = verifier.with_allowed_algorithms(parse_algorithms(&value)?);
        }

        verifier = verifier
            .with_nbf_validation(flag(&var, "JWT_VALIDATE_NBF"))
            .with_iat_validation(flag(&var, "JWT_VALIDATE_IAT"));

        let jwks_timeout = seconds(&var, "JWKS_TIMEOUT_SECONDS", DEFAULT_JWKS_TIMEOUT_SECS)?.max(1);
        let refresh_interval =
            seconds(&var, "JWKS_REFRESH_SECONDS", DEFAULT_REFRESH_SECS)?.max(MIN_REFRESH_SECS);
        let min_refresh_interval =
            seconds(&var, "JWKS_MIN_REFRESH_SECONDS", DEFAULT_MIN_REFRESH_SECS)?;

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("Failed to parse PORT '{value}'"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            key_source,
            verifier,
            jwks_timeout: Duration::from_secs(jwks_timeout),
            refresh_interval: Duration::from_secs(refresh_interval),
            min_refresh_interval: Duration::from_secs(min_refresh_interval),
            host,
            port,
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid HOST '{}'", self.host))?;
        Ok(SocketAddr::from((ip, self.port)))
    }

    /// Whether keys come from an endpoint worth polling.
    pub fn refreshes_keys(&self) -> bool {
        matches!(self.key_source, KeySourceConfig::Jwks { .. })
    }
}

fn flag<F>(var: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    var(key).is_some_and(|value| {
        matches!(
            value.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn seconds<F>(var: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .parse::<u64>()
            .with_context(|| format!("Failed to parse {key} '{value}'")),
        None => Ok(default),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn parse_algorithms(value: &str) -> Result<Vec<Algorithm>> {
    let algorithms = parse_list(value)
        .iter()
        .map(|name| {
            // `EdDSA` is the one mixed-case name
            if name.eq_ignore_ascii_case("eddsa") {
                return Ok(Algorithm::EdDSA);
            }
            Algorithm::from_str(&name.to_ascii_uppercase())
                .map_err(|_| anyhow!("Unsupported algorithm '{name}' in JWT_ALLOWED_ALGORITHMS"))
        })
        .collect::<Result<Vec<_>>>()?;
    if algorithms.is_empty() {
        return Err(anyhow!("JWT_ALLOWED_ALGORITHMS must name at least one algorithm"));
    }
    Ok(algorithms)
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(pairs: &[(&str, &str)]) -> Result<AuthorizerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AuthorizerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    const POOL: &[(&str, &str)] = &[
        ("USER_POOL_REGION", "eu-central-1"),
        ("USER_POOL_ID", "eu-central-1_Pool"),
        ("USER_POOL_CLIENT_ID", "app1"),
    ];

    #[test]
    fn pool_settings_build_cognito_url_and_defaults() {
        let config = parse(POOL).expect("config");
        assert_eq!(
            config.key_source,
            KeySourceConfig::Jwks {
                url: "https://cognito-idp.eu-central-1.amazonaws.com/eu-central-1_Pool/.well-known/jwks.json"
                    .to_string()
            }
        );
        assert_eq!(config.verifier.audiences, vec!["app1".to_string()]);
        assert_eq!(config.verifier.leeway_seconds, 0);
        assert_eq!(config.verifier.allowed_algorithms, vec![Algorithm::RS256]);
        assert_eq!(config.verifier.issuer, None);
        assert_eq!(config.jwks_timeout, Duration::from_secs(5));
        assert_eq!(config.refresh_interval, Duration::from_secs(300));
        assert_eq!(config.port, 8090);
        assert!(config.refreshes_keys());
        assert_eq!(config.listen_addr().unwrap().to_string(), "0.0.0.0:8090");
    }

    #[test]
    fn explicit_url_and_options_override_defaults() {
        let mut pairs = POOL.to_vec();
        pairs.extend([
            ("JWT_JWKS_URL", "https://keys.example/jwks.json"),
            ("JWT_AUDIENCE", "app1, app2"),
            ("JWT_AUDIENCE_CLAIM", "client_id"),
            ("JWT_LEEWAY_SECONDS", "30"),
            ("JWT_ALLOWED_ALGORITHMS", "rs256,PS256,EdDSA"),
            ("JWT_VALIDATE_ISSUER", "true"),
            ("JWT_VALIDATE_NBF", "yes"),
            ("JWKS_REFRESH_SECONDS", "10"),
            ("PORT", "9000"),
        ]);
        let config = parse(&pairs).expect("config");

        assert_eq!(
            config.key_source,
            KeySourceConfig::Jwks {
                url: "https://keys.example/jwks.json".to_string()
            }
        );
        assert_eq!(
            config.verifier.audiences,
            vec!["app1".to_string(), "app2".to_string()]
        );
        assert_eq!(config.verifier.audience_claim, AudienceClaim::ClientId);
        assert_eq!(config.verifier.leeway_seconds, 30);
        assert_eq!(
            config.verifier.allowed_algorithms,
            vec![Algorithm::RS256, Algorithm::PS256, Algorithm::EdDSA]
        );
        assert_eq!(
            config.verifier.issuer.as_deref(),
            Some("https://cognito-idp.eu-central-1.amazonaws.com/eu-central-1_Pool")
        );
        assert!(config.verifier.validate_nbf);
        assert!(!config.verifier.validate_iat);
        // floor applies
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn algorithm_names_are_case_insensitive() {
        let mut pairs = POOL.to_vec();
        pairs.push(("JWT_ALLOWED_ALGORITHMS", "eddsa es256"));
        let config = parse(&pairs).expect("config");
        assert_eq!(
            config.verifier.allowed_algorithms,
            vec![Algorithm::EdDSA, Algorithm::ES256]
        );
    }

    #[test]
    fn dev_pem_is_used_without_pool() {
        let config = parse(&[
            ("JWT_DEV_PUBLIC_KEY_PEM", "-----BEGIN RSA PUBLIC KEY-----"),
            ("JWT_AUDIENCE", "app1"),
        ])
        .expect("config");
        assert!(matches!(config.key_source, KeySourceConfig::DevPem { .. }));
        assert!(!config.refreshes_keys());
    }

    #[test]
    fn missing_required_settings_fail() {
        let err = parse(&[("USER_POOL_CLIENT_ID", "app1")]).unwrap_err();
        assert!(err.to_string().contains("USER_POOL_REGION"));

        let err = parse(&[("USER_POOL_REGION", "r"), ("USER_POOL_ID", "p")]).unwrap_err();
        assert!(err.to_string().contains("USER_POOL_CLIENT_ID"));

        let err = parse(&[
            ("JWT_JWKS_URL", "https://keys"),
            ("USER_POOL_CLIENT_ID", " , "),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("USER_POOL_CLIENT_ID"));
    }

    #[test]
    fn invalid_values_are_reported() {
        for (key, value) in [
            ("JWT_ALLOWED_ALGORITHMS", "none"),
            ("JWT_AUDIENCE_CLAIM", "sub"),
            ("JWT_LEEWAY_SECONDS", "-5"),
            ("JWKS_TIMEOUT_SECONDS", "soon"),
            ("PORT", "70000"),
        ] {
            let mut pairs = POOL.to_vec();
            pairs.push((key, value));
            let err = parse(&pairs).expect_err("should fail");
            assert!(err.to_string().contains(key), "{key}: {err}");
        }
    }

    #[test]
    fn blank_values_count_as_unset() {
        let mut pairs = POOL.to_vec();
        pairs.extend([("JWT_JWKS_URL", "   "), ("JWT_ISSUER", "")]);
        let config = parse(&pairs).expect("config");
        assert!(matches!(
            config.key_source,
            KeySourceConfig::Jwks { ref url } if url.contains("cognito-idp")
        ));
        assert!(config.verifier.issuer.is_none());
    }
}
