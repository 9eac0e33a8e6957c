#![allow(dead_code)]

use std::sync::OnceLock;

use authorizer_auth::{KeySet, SigningKey};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

pub const NOW: i64 = 1_700_000_000;
pub const AUDIENCE: &str = "app1";

pub struct TestKey {
    pub kid: &'static str,
    pub modulus: String,
    pub exponent: String,
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

        Self {
            kid,
            modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
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
        self.sign_with(self.kid, claims)
    }

    pub fn sign_with(&self, kid: &str, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, &self.encoding).expect("sign token")
    }
}

/// `k1` and `k2`, generated once per test binary.
pub fn keys() -> &'static (TestKey, TestKey) {
    static KEYS: OnceLock<(TestKey, TestKey)> = OnceLock::new();
    KEYS.get_or_init(|| (TestKey::generate("k1"), TestKey::generate("k2")))
}

pub fn key_set(keys: &[&TestKey]) -> KeySet {
    KeySet::new(keys.iter().map(|key| key.signing_key())).expect("key set")
}

pub fn claims(exp: i64, aud: &str) -> Value {
    json!({ "sub": "user-1", "exp": exp, "aud": aud, "token_use": "id" })
}

pub fn replace_segment(token: &str, index: usize, raw: &str) -> String {
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    parts[index] = raw.to_string();
    parts.join(".")
}

pub fn encode_json(value: &Value) -> String {
    URL_SAFE_NO_PAD.encode(value.to_string())
}
