use std::str::FromStr;

use jsonwebtoken::{crypto, Algorithm};
use tracing::debug;

use crate::config::VerifierConfig;
use crate::keys::SigningKey;
use crate::token::CompactToken;

/// Checks a token's signature against one resolved key.
///
/// The header algorithm must be allow-listed and must fit the key before any
/// cryptography runs, so `none` and algorithm-substitution tokens never reach it.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    allowed: Vec<Algorithm>,
}

impl SignatureVerifier {
    pub fn new<I>(allowed: I) -> Self
    where
        I: IntoIterator<Item = Algorithm>,
    {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn from_config(config: &VerifierConfig) -> Self {
        Self::new(config.allowed_algorithms.iter().copied())
    }

    pub fn allowed(&self) -> &[Algorithm] {
        &self.allowed
    }

    /// Returns `false` for every kind of mismatch, including malformed input.
    pub fn verify(&self, token: &CompactToken<'_>, key: &SigningKey) -> bool {
        let Ok(header) = token.header() else {
            return false;
        };
        let Some(algorithm) = self.permitted_algorithm(&header.alg, key) else {
            return false;
        };

        let signature = token.signature().trim_end_matches('=');
        if signature.is_empty() {
            return false;
        }

        match crypto::verify(
            signature,
            token.signing_input().as_bytes(),
            key.decoding_key(),
            algorithm,
        ) {
            Ok(valid) => valid,
            Err(err) => {
                debug!(error = %err, "Signature check errored");
                false
            }
        }
    }

    fn permitted_algorithm(&self, alg: &str, key: &SigningKey) -> Option<Algorithm> {
        // "none" and unknown names fail to parse
        let Ok(algorithm) = Algorithm::from_str(alg) else {
            debug!("Rejecting token with unrecognised algorithm");
            return None;
        };
        if !self.allowed.contains(&algorithm) {
            debug!(?algorithm, "Rejecting token with algorithm outside allow-list");
            return None;
        }
        if !key.accepts(algorithm) {
            debug!(?algorithm, kid = key.kid(), "Algorithm does not fit the resolved key");
            return None;
        }
        Some(algorithm)
    }
}
