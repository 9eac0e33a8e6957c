use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{AudienceClaim, VerifierConfig};
use crate::error::ClaimsRejection;
use crate::token::decode_json_segment;

/// Claims of a token whose signature has already been verified.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub subject: Option<String>,
    pub issuer: Option<String>,
    pub audience: Vec<String>,
    pub client_id: Option<String>,
    pub expires_at: Option<i64>,
    pub not_before: Option<i64>,
    pub issued_at: Option<i64>,
    pub token_use: Option<String>,
    pub scope: Option<String>,
    pub raw: serde_json::Value,
}

impl Claims {
    /// Decode a base64url payload segment. Call only after the signature checks out.
    pub(crate) fn decode(segment: &str) -> Result<Self, ClaimsRejection> {
        let value: serde_json::Value =
            decode_json_segment(segment).map_err(|_| ClaimsRejection::Undecodable)?;
        Self::try_from(value)
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
    }

    /// Audience values under the configured claim policy.
    fn audience_for(&self, claim: AudienceClaim) -> Vec<&str> {
        let aud = self.audience.iter().map(String::as_str);
        let client_id = self.client_id.as_deref();
        match claim {
            AudienceClaim::Aud => aud.collect(),
            AudienceClaim::ClientId => client_id.into_iter().collect(),
            AudienceClaim::Any if !self.audience.is_empty() => aud.collect(),
            AudienceClaim::Any => client_id.into_iter().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    #[serde(default)]
    sub: Option<serde_json::Value>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<AudienceRepr>,
    #[serde(default)]
    client_id: Option<serde_json::Value>,
    #[serde(default)]
    exp: Option<f64>,
    #[serde(default)]
    nbf: Option<f64>,
    #[serde(default)]
    iat: Option<f64>,
    #[serde(default)]
    token_use: Option<serde_json::Value>,
    #[serde(default)]
    scope: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AudienceRepr {
    Single(String),
    Many(Vec<String>),
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = ClaimsRejection;

    fn try_from(value: serde_json::Value) -> Result<Self, ClaimsRejection> {
        if !value.is_object() {
            return Err(ClaimsRejection::Undecodable);
        }
        let repr: ClaimsRepr =
            serde_json::from_value(value.clone()).map_err(|_| ClaimsRejection::Undecodable)?;

        let audience = match repr.aud {
            Some(AudienceRepr::Single(item)) => vec![item],
            Some(AudienceRepr::Many(items)) => items,
            None => Vec::new(),
        };

        Ok(Self {
            subject: string_claim(repr.sub),
            issuer: repr.iss,
            audience,
            client_id: string_claim(repr.client_id),
            expires_at: repr.exp.map(numeric_date),
            not_before: repr.nbf.map(numeric_date),
            issued_at: repr.iat.map(numeric_date),
            token_use: string_claim(repr.token_use),
            scope: string_claim(repr.scope),
            raw: value,
        })
    }
}

// Informational claims of another type are dropped instead of failing the payload.
fn string_claim(value: Option<serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(value)) => Some(value),
        _ => None,
    }
}

// NumericDate may carry a fraction; whole seconds are enough here.
fn numeric_date(value: f64) -> i64 {
    value.floor() as i64
}

/// A policy applied to verified claims.
pub trait ClaimsCheck: Send + Sync {
    fn check(&self, claims: &Claims, now: i64) -> Result<(), ClaimsRejection>;
}

/// Expiry and audience checks, plus the opt-in issuer, `nbf` and `iat` checks.
///
/// Pure: depends only on the claims, its configuration and the supplied time.
#[derive(Debug, Clone)]
pub struct ClaimsValidator {
    audiences: Vec<String>,
    audience_claim: AudienceClaim,
    issuer: Option<String>,
    leeway: i64,
    validate_nbf: bool,
    validate_iat: bool,
}

impl ClaimsValidator {
    pub fn from_config(config: &VerifierConfig) -> Self {
        Self {
            audiences: config.audiences.clone(),
            audience_claim: config.audience_claim,
            issuer: config.issuer.clone(),
            leeway: i64::from(config.leeway_seconds),
            validate_nbf: config.validate_nbf,
            validate_iat: config.validate_iat,
        }
    }

    pub fn validate(&self, claims: &Claims, now: i64) -> bool {
        self.check(claims, now).is_ok()
    }

    fn check_expiry(&self, claims: &Claims, now: i64) -> Result<(), ClaimsRejection> {
        let exp = claims.expires_at.ok_or(ClaimsRejection::MissingExpiry)?;
        if now > exp.saturating_add(self.leeway) {
            return Err(ClaimsRejection::Expired);
        }
        Ok(())
    }

    fn check_audience(&self, claims: &Claims) -> Result<(), ClaimsRejection> {
        let presented = claims.audience_for(self.audience_claim);
        if presented.is_empty() {
            return Err(ClaimsRejection::MissingAudience);
        }
        let matched = presented
            .iter()
            .any(|value| self.audiences.iter().any(|expected| expected == value));
        if matched {
            Ok(())
        } else {
            Err(ClaimsRejection::AudienceMismatch)
        }
    }
}

impl ClaimsCheck for ClaimsValidator {
    fn check(&self, claims: &Claims, now: i64) -> Result<(), ClaimsRejection> {
        self.check_expiry(claims, now)?;
        self.check_audience(claims)?;

        if let Some(expected) = &self.issuer {
            if claims.issuer.as_deref() != Some(expected.as_str()) {
                return Err(ClaimsRejection::IssuerMismatch);
            }
        }

        let horizon = now.saturating_add(self.leeway);
        if self.validate_nbf {
            if let Some(nbf) = claims.not_before {
                if nbf > horizon {
                    return Err(ClaimsRejection::NotYetValid);
                }
            }
        }
        if self.validate_iat {
            if let Some(iat) = claims.issued_at {
                if iat > horizon {
                    return Err(ClaimsRejection::IssuedInFuture);
                }
            }
        }

        Ok(())
    }
}

/// Validate claims against a configuration at time `now` (epoch seconds).
pub fn validate(claims: &Claims, config: &VerifierConfig, now: i64) -> bool {
    ClaimsValidator::from_config(config).validate(claims, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn claims(value: serde_json::Value) -> Claims {
        Claims::try_from(value).expect("claims decode")
    }

    fn config() -> VerifierConfig {
        VerifierConfig::new("app1")
    }

    fn check(config: &VerifierConfig, value: serde_json::Value) -> Result<(), ClaimsRejection> {
        ClaimsValidator::from_config(config).check(&claims(value), NOW)
    }

    #[test]
    fn accepts_unexpired_token_for_configured_audience() {
        assert!(validate(
            &claims(json!({ "exp": NOW + 3600, "aud": "app1", "sub": "user-1" })),
            &config(),
            NOW
        ));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        assert_eq!(check(&config(), json!({ "exp": NOW, "aud": "app1" })), Ok(()));
        assert_eq!(
            check(&config(), json!({ "exp": NOW - 1, "aud": "app1" })),
            Err(ClaimsRejection::Expired)
        );
    }

    #[test]
    fn leeway_extends_expiry() {
        let lenient = config().with_leeway(120);
        assert_eq!(check(&lenient, json!({ "exp": NOW - 100, "aud": "app1" })), Ok(()));
        assert_eq!(
            check(&config(), json!({ "exp": NOW - 100, "aud": "app1" })),
            Err(ClaimsRejection::Expired)
        );
    }

    #[test]
    fn missing_fields_fail_validation() {
        assert_eq!(
            check(&config(), json!({ "aud": "app1" })),
            Err(ClaimsRejection::MissingExpiry)
        );
        assert_eq!(
            check(&config(), json!({ "exp": NOW + 60 })),
            Err(ClaimsRejection::MissingAudience)
        );
    }

    #[test]
    fn audience_is_exact_match() {
        for aud in ["wrong-app", "app", "app1 ", "APP1", "app12"] {
            assert_eq!(
                check(&config(), json!({ "exp": NOW + 60, "aud": aud })),
                Err(ClaimsRejection::AudienceMismatch),
                "{aud:?}"
            );
        }
    }

    #[test]
    fn audience_array_matches_any_element() {
        assert_eq!(
            check(&config(), json!({ "exp": NOW + 60, "aud": ["other", "app1"] })),
            Ok(())
        );
    }

    #[test]
    fn additional_audiences_are_accepted() {
        let config = config().with_additional_audience("app2");
        assert_eq!(check(&config, json!({ "exp": NOW + 60, "aud": "app2" })), Ok(()));
    }

    #[test]
    fn client_id_serves_access_tokens() {
        let access = json!({ "exp": NOW + 60, "client_id": "app1", "token_use": "access" });
        assert_eq!(check(&config(), access.clone()), Ok(()));
        assert_eq!(
            check(&config().with_audience_claim(AudienceClaim::Aud), access),
            Err(ClaimsRejection::MissingAudience)
        );

        let id_token = json!({ "exp": NOW + 60, "aud": "app1", "client_id": "other" });
        assert_eq!(check(&config(), id_token.clone()), Ok(()));
        assert_eq!(
            check(
                &config().with_audience_claim(AudienceClaim::ClientId),
                id_token
            ),
            Err(ClaimsRejection::AudienceMismatch)
        );
    }

    #[test]
    fn issuer_checked_only_when_configured() {
        let value = json!({ "exp": NOW + 60, "aud": "app1", "iss": "https://issuer" });
        assert_eq!(check(&config(), value.clone()), Ok(()));
        assert_eq!(
            check(&config().with_issuer("https://issuer"), value.clone()),
            Ok(())
        );
        assert_eq!(
            check(&config().with_issuer("https://elsewhere"), value),
            Err(ClaimsRejection::IssuerMismatch)
        );
    }

    #[test]
    fn nbf_and_iat_are_opt_in() {
        let future = json!({ "exp": NOW + 600, "aud": "app1", "nbf": NOW + 300, "iat": NOW + 300 });
        assert_eq!(check(&config(), future.clone()), Ok(()));
        assert_eq!(
            check(&config().with_nbf_validation(true), future.clone()),
            Err(ClaimsRejection::NotYetValid)
        );
        assert_eq!(
            check(&config().with_iat_validation(true), future.clone()),
            Err(ClaimsRejection::IssuedInFuture)
        );
        assert_eq!(
            check(
                &config()
                    .with_nbf_validation(true)
                    .with_iat_validation(true)
                    .with_leeway(300),
                future
            ),
            Ok(())
        );
    }

    #[test]
    fn payload_must_be_a_json_object() {
        assert_eq!(
            Claims::try_from(json!(["exp"])).unwrap_err(),
            ClaimsRejection::Undecodable
        );
        assert_eq!(
            Claims::try_from(json!({ "exp": "tomorrow" })).unwrap_err(),
            ClaimsRejection::Undecodable
        );
        assert_eq!(Claims::decode("!!").unwrap_err(), ClaimsRejection::Undecodable);
    }

    #[test]
    fn non_string_informational_claims_are_dropped() {
        let decoded = claims(json!({
            "exp": NOW + 60,
            "aud": "app1",
            "sub": 42,
            "scope": ["read", "write"],
            "token_use": { "kind": "id" },
            "client_id": null
        }));
        assert_eq!(decoded.subject, None);
        assert_eq!(decoded.scope, None);
        assert_eq!(decoded.token_use, None);
        assert_eq!(decoded.client_id, None);
        assert_eq!(decoded.raw["sub"], 42);
        assert!(validate(&decoded, &config(), NOW));
    }

    #[test]
    fn fractional_dates_and_scopes_decode() {
        let claims = claims(json!({
            "exp": 1_700_000_000.75,
            "scope": "openid profile  email"
        }));
        assert_eq!(claims.expires_at, Some(1_700_000_000));
        assert_eq!(
            claims.expires_at_utc().map(|at| at.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(
            claims.scopes().collect::<Vec<_>>(),
            vec!["openid", "profile", "email"]
        );
    }
}
