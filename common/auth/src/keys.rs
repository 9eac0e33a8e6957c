use std::collections::HashMap;
use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey};

use crate::error::{VerificationError, VerificationResult};

/// Public key families a key set can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    Rsa,
    Ec,
    Okp,
}

impl KeyFamily {
    /// The family an algorithm requires. Symmetric algorithms have none: a public
    /// key set never verifies them.
    pub fn of(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Some(Self::Rsa),
            Algorithm::ES256 | Algorithm::ES384 => Some(Self::Ec),
            Algorithm::EdDSA => Some(Self::Okp),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => None,
        }
    }
}

/// A public verification key identified by `kid`.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    family: KeyFamily,
    algorithm: Option<Algorithm>,
    key: DecodingKey,
}

impl SigningKey {
    /// RSA key from base64url modulus and exponent.
    pub fn from_rsa_components(
        kid: impl Into<String>,
        modulus: &str,
        exponent: &str,
    ) -> VerificationResult<Self> {
        let kid = kid.into();
        let key = DecodingKey::from_rsa_components(modulus, exponent)
            .map_err(|err| key_parse_error(&kid, err))?;
        Ok(Self {
            kid,
            family: KeyFamily::Rsa,
            algorithm: None,
            key,
        })
    }

    pub fn from_rsa_pem(kid: impl Into<String>, pem: &[u8]) -> VerificationResult<Self> {
        let kid = kid.into();
        let key = DecodingKey::from_rsa_pem(pem).map_err(|err| key_parse_error(&kid, err))?;
        Ok(Self {
            kid,
            family: KeyFamily::Rsa,
            algorithm: None,
            key,
        })
    }

    /// EC key from base64url affine coordinates. The curve pins the algorithm.
    pub fn from_ec_components(
        kid: impl Into<String>,
        curve: &str,
        x: &str,
        y: &str,
    ) -> VerificationResult<Self> {
        let kid = kid.into();
        let algorithm = match curve {
            "P-256" => Algorithm::ES256,
            "P-384" => Algorithm::ES384,
            other => {
                return Err(VerificationError::KeySourceMalformed(format!(
                    "key '{kid}' uses unsupported curve '{other}'"
                )))
            }
        };
        let key = DecodingKey::from_ec_components(x, y).map_err(|err| key_parse_error(&kid, err))?;
        Ok(Self {
            kid,
            family: KeyFamily::Ec,
            algorithm: Some(algorithm),
            key,
        })
    }

    /// Ed25519 key from its base64url public component.
    pub fn from_ed_components(kid: impl Into<String>, x: &str) -> VerificationResult<Self> {
        let kid = kid.into();
        let key = DecodingKey::from_ed_components(x).map_err(|err| key_parse_error(&kid, err))?;
        Ok(Self {
            kid,
            family: KeyFamily::Okp,
            algorithm: Some(Algorithm::EdDSA),
            key,
        })
    }

    /// Restrict the key to one algorithm (the JWK `alg` member).
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> VerificationResult<Self> {
        if KeyFamily::of(algorithm) != Some(self.family) {
            return Err(VerificationError::KeySourceMalformed(format!(
                "key '{}' declares alg {algorithm:?} that does not fit its key type",
                self.kid
            )));
        }
        self.algorithm = Some(algorithm);
        Ok(self)
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }

    /// Whether this key may verify a signature made with `algorithm`.
    pub fn accepts(&self, algorithm: Algorithm) -> bool {
        KeyFamily::of(algorithm) == Some(self.family)
            && self.algorithm.map_or(true, |pinned| pinned == algorithm)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

fn key_parse_error(kid: &str, err: jsonwebtoken::errors::Error) -> VerificationError {
    VerificationError::KeySourceMalformed(format!("failed to parse key '{kid}': {err}"))
}

/// Ordered, read-only collection of signing keys, unique by `kid`.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<SigningKey>,
    index: HashMap<String, usize>,
}

impl KeySet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a key set, rejecting duplicate identifiers.
    pub fn new<I>(keys: I) -> VerificationResult<Self>
    where
        I: IntoIterator<Item = SigningKey>,
    {
        let mut set = Self::default();
        for key in keys.into_iter() {
            if set.index.contains_key(key.kid()) {
                return Err(VerificationError::KeySourceMalformed(format!(
                    "duplicate kid '{}'",
                    key.kid()
                )));
            }
            set.index.insert(key.kid.clone(), set.keys.len());
            set.keys.push(key);
        }
        Ok(set)
    }

    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.index.get(kid).map(|position| &self.keys[*position])
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.index.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SigningKey> {
        self.keys.iter()
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(SigningKey::kid)
    }
}
