//! RSA key material and token builders shared by the unit tests.

use std::sync::OnceLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

use crate::keys::{KeySet, SigningKey};

pub(crate) struct TestKey {
    pub kid: &'static str,
    pub modulus: String,
    pub exponent: String,
    pub public_pem: String,
    encoding: EncodingKey,
}

impl TestKey {
    fn generate(kid: &'static str) -> Self {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
        let public_key = private_key.to_public_key();

        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("private pem");
        let public_pem = public_key.to_pkcs1_pem(LineEnding::LF).expect("public pem");

        Self {
            kid,
            modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
            public_pem,
            encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
        }
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_rsa_components(self.kid, &self.modulus, &self.exponent)
            .expect("signing key")
    }

    pub fn jwk(&self) -> Value {
        json!({
            "kid": self.kid,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": self.modulus,
            "e": self.exponent
        })
    }

    pub fn sign(&self, claims: &Value) -> String {
        self.sign_as(self.kid, claims)
    }

    /// Sign with this key but label the header with another `kid`.
    pub fn sign_as(&self, kid: &str, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, &self.encoding).expect("sign token")
    }
}

pub(crate) fn primary() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| TestKey::generate("primary"))
}

pub(crate) fn secondary() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| TestKey::generate("secondary"))
}

pub(crate) fn key_set(keys: &[&TestKey]) -> KeySet {
    KeySet::new(keys.iter().map(|key| key.signing_key())).expect("key set")
}

/// Segment surgery on already-signed tokens.
pub(crate) mod forge {
    use super::*;

    fn segments(token: &str) -> Vec<String> {
        token.split('.').map(str::to_string).collect()
    }

    pub fn replace_header(token: &str, header: &Value) -> String {
        let mut parts = segments(token);
        parts[0] = URL_SAFE_NO_PAD.encode(header.to_string());
        parts.join(".")
    }

    pub fn replace_payload(token: &str, claims: &Value) -> String {
        let mut parts = segments(token);
        parts[1] = URL_SAFE_NO_PAD.encode(claims.to_string());
        parts.join(".")
    }

    pub fn replace_signature(token: &str, signature: &str) -> String {
        let mut parts = segments(token);
        parts[2] = signature.to_string();
        parts.join(".")
    }
}
