use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{VerificationError, VerificationResult};

/// Unverified JOSE header. Only used to pick a key and an algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    pub kid: String,
    /// Raw `alg` value; checked against the allow-list by the signature verifier.
    pub alg: String,
    pub typ: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HeaderRepr {
    #[serde(default)]
    kid: Option<String>,
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

/// A compact `header.payload.signature` token borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct CompactToken<'a> {
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
    signing_input: &'a str,
}

impl<'a> CompactToken<'a> {
    /// Split a token into its three segments without decoding anything.
    pub fn parse(raw: &'a str) -> VerificationResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(VerificationError::EmptyToken);
        }

        let mut segments = raw.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(VerificationError::EmptyToken);
        };

        // header and payload plus the dot between them
        let signing_input = &raw[..header.len() + 1 + payload.len()];

        Ok(Self {
            header,
            payload,
            signature,
            signing_input,
        })
    }

    /// Decode the header without trusting it.
    pub fn header(&self) -> VerificationResult<TokenHeader> {
        let repr: HeaderRepr = decode_json_segment(self.header)
            .map_err(VerificationError::HeaderMalformed)?;
        let kid = repr
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| VerificationError::HeaderMalformed("missing kid".to_string()))?;

        Ok(TokenHeader {
            kid,
            alg: repr.alg,
            typ: repr.typ,
        })
    }

    /// The bytes covered by the signature: everything before the final dot.
    pub fn signing_input(&self) -> &'a str {
        self.signing_input
    }

    /// The base64url signature segment.
    pub fn signature(&self) -> &'a str {
        self.signature
    }

    /// Raw base64url payload segment. Only decode it once the signature is trusted.
    pub(crate) fn payload_segment(&self) -> &'a str {
        self.payload
    }
}

/// Decode a base64url segment, tolerating trailing padding.
pub(crate) fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))
}

pub(crate) fn decode_json_segment<T: DeserializeOwned>(segment: &str) -> Result<T, String> {
    let bytes = decode_segment(segment).map_err(|err| err.to_string())?;
    serde_json::from_slice(&bytes).map_err(|err| err.to_string())
}
