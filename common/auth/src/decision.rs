use serde::Serialize;

use crate::error::VerificationResult;
use crate::verifier::VerifiedToken;

pub const REASON_ALLOWED: &str = "allowed";

/// What the gateway needs to know: allow or deny, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl AuthorizationDecision {
    pub fn allow(subject: Option<String>) -> Self {
        Self {
            allowed: true,
            reason: REASON_ALLOWED,
            subject,
        }
    }

    pub fn deny(reason: &'static str) -> Self {
        Self {
            allowed: false,
            reason,
            subject: None,
        }
    }

    pub fn from_result(result: &VerificationResult<VerifiedToken>) -> Self {
        match result {
            Ok(verified) => Self::allow(verified.claims.subject.clone()),
            Err(err) => Self::deny(err.reason_code()),
        }
    }
}
