use jsonwebtoken::Algorithm;

/// Which payload claim carries the audience.
///
/// Identity tokens put it in `aud`, access tokens in `client_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudienceClaim {
    Aud,
    ClientId,
    /// `aud` when present, otherwise `client_id`.
    #[default]
    Any,
}

impl AudienceClaim {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "aud" => Some(Self::Aud),
            "client_id" => Some(Self::ClientId),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

/// Runtime configuration for token verification.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Accepted audience values; a token must match one of them exactly.
    pub audiences: Vec<String>,
    pub audience_claim: AudienceClaim,
    /// Expected issuer claim (iss); unchecked when absent.
    pub issuer: Option<String>,
    /// Allowable clock skew in seconds for the time-based checks.
    pub leeway_seconds: u32,
    /// Header algorithms accepted before any signature work happens.
    pub allowed_algorithms: Vec<Algorithm>,
    pub validate_nbf: bool,
    pub validate_iat: bool,
}

impl VerifierConfig {
    /// Construct config with strict defaults (RS256 only, no leeway).
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audiences: vec![audience.into()],
            audience_claim: AudienceClaim::default(),
            issuer: None,
            leeway_seconds: 0,
            allowed_algorithms: vec![Algorithm::RS256],
            validate_nbf: false,
            validate_iat: false,
        }
    }

    pub fn with_additional_audience(mut self, audience: impl Into<String>) -> Self {
        self.audiences.push(audience.into());
        self
    }

    pub fn with_audience_claim(mut self, claim: AudienceClaim) -> Self {
        self.audience_claim = claim;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn with_allowed_algorithms<I>(mut self, algorithms: I) -> Self
    where
        I: IntoIterator<Item = Algorithm>,
    {
        self.allowed_algorithms = algorithms.into_iter().collect();
        self
    }

    pub fn with_nbf_validation(mut self, enabled: bool) -> Self {
        self.validate_nbf = enabled;
        self
    }

    pub fn with_iat_validation(mut self, enabled: bool) -> Self {
        self.validate_iat = enabled;
        self
    }

    pub fn allows(&self, algorithm: Algorithm) -> bool {
        self.allowed_algorithms.contains(&algorithm)
    }
}
