pub mod claims;
pub mod clock;
pub mod config;
pub mod decision;
pub mod error;
pub mod jwks;
pub mod keys;
pub mod provider;
pub mod signature;
pub mod token;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use claims::{Claims, ClaimsCheck, ClaimsValidator};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AudienceClaim, VerifierConfig};
pub use decision::AuthorizationDecision;
pub use error::{ClaimsRejection, ErrorKind, VerificationError, VerificationResult};
pub use jwks::{cognito_issuer, cognito_jwks_url, JwksFetcher, KeySource, StaticKeySource};
pub use keys::{KeyFamily, KeySet, SigningKey};
pub use provider::KeySetProvider;
pub use signature::SignatureVerifier;
pub use token::{CompactToken, TokenHeader};
pub use verifier::{TokenVerifier, TokenVerifierBuilder, VerifiedToken};

pub use jsonwebtoken::Algorithm;
