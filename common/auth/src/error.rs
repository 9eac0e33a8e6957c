use std::fmt;

use thiserror::Error;

pub type VerificationResult<T> = Result<T, VerificationError>;

/// Every way a token (or the key source behind it) can fail verification.
///
/// Payloads describe the failure only; they never carry token bytes or key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("token missing or not a three-segment compact token")]
    EmptyToken,
    #[error("failed to decode token header: {0}")]
    HeaderMalformed(String),
    #[error("no signing key registered for kid '{0}'")]
    KeyNotFound(String),
    #[error("token signature verification failed")]
    SignatureInvalid,
    #[error("token claims rejected: {0}")]
    ClaimsInvalid(ClaimsRejection),
    #[error("failed to fetch signing keys: {0}")]
    KeySourceUnavailable(String),
    #[error("failed to parse signing keys: {0}")]
    KeySourceMalformed(String),
}

/// Payload-free discriminant of [`VerificationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EmptyToken,
    HeaderMalformed,
    KeyNotFound,
    SignatureInvalid,
    ClaimsInvalid,
    KeySourceUnavailable,
    KeySourceMalformed,
}

impl ErrorKind {
    /// Stable snake_case code used in logs, metrics labels and deny responses.
    pub fn reason_code(self) -> &'static str {
        match self {
            ErrorKind::EmptyToken => "empty_token",
            ErrorKind::HeaderMalformed => "header_malformed",
            ErrorKind::KeyNotFound => "key_not_found",
            ErrorKind::SignatureInvalid => "signature_invalid",
            ErrorKind::ClaimsInvalid => "claims_invalid",
            ErrorKind::KeySourceUnavailable => "key_source_unavailable",
            ErrorKind::KeySourceMalformed => "key_source_malformed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason_code())
    }
}

impl VerificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerificationError::EmptyToken => ErrorKind::EmptyToken,
            VerificationError::HeaderMalformed(_) => ErrorKind::HeaderMalformed,
            VerificationError::KeyNotFound(_) => ErrorKind::KeyNotFound,
            VerificationError::SignatureInvalid => ErrorKind::SignatureInvalid,
            VerificationError::ClaimsInvalid(_) => ErrorKind::ClaimsInvalid,
            VerificationError::KeySourceUnavailable(_) => ErrorKind::KeySourceUnavailable,
            VerificationError::KeySourceMalformed(_) => ErrorKind::KeySourceMalformed,
        }
    }

    pub fn reason_code(&self) -> &'static str {
        self.kind().reason_code()
    }
}

/// Why a signed payload failed the claims check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ClaimsRejection {
    #[error("payload is not a JSON claims object")]
    Undecodable,
    #[error("exp claim missing")]
    MissingExpiry,
    #[error("token expired")]
    Expired,
    #[error("token not valid yet (nbf)")]
    NotYetValid,
    #[error("token issued in the future (iat)")]
    IssuedInFuture,
    #[error("audience claim missing")]
    MissingAudience,
    #[error("audience does not match")]
    AudienceMismatch,
    #[error("issuer does not match")]
    IssuerMismatch,
}

impl From<ClaimsRejection> for VerificationError {
    fn from(value: ClaimsRejection) -> Self {
        Self::ClaimsInvalid(value)
    }
}
