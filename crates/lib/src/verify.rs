//! Request verification: bearer token (dev/local) or Slack signed secret (prod).
//!
//! The strategy is picked once at startup from the boot mode. Verification is a pure
//! check over the inbound headers and raw body; it never touches the network.

use crate::config::{BootMode, Credentials};
use crate::inbound::InboundRequest;
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const SLACK_SIGNATURE_HEADER: &str = "X-Slack-Signature";
pub const SLACK_TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";

/// Slack signature version prefix.
pub const SLACK_SIGNATURE_VERSION: &str = "v0";

/// Maximum allowed clock skew for Slack signatures (5 minutes).
pub const SLACK_SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("{0} header is missing")]
    MissingHeader(&'static str),
    #[error("invalid {0} header format")]
    MalformedHeader(&'static str),
    #[error("invalid token")]
    TokenMismatch,
    #[error("signature invalid: {0}")]
    SignatureInvalid(&'static str),
}

/// The two verification strategies. The secret is the shared AUTH_SECRET.
#[derive(Clone)]
pub enum RequestVerifier {
    Bearer { secret: String },
    SlackSignature { secret: String },
}

impl std::fmt::Debug for RequestVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RequestVerifier::{}", self.kind())
    }
}

impl RequestVerifier {
    /// dev/local verify a bearer token; prod verifies Slack request signatures.
    pub fn for_mode(mode: BootMode, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if mode.uses_bearer() {
            RequestVerifier::Bearer { secret }
        } else {
            RequestVerifier::SlackSignature { secret }
        }
    }

    pub fn from_credentials(creds: &Credentials) -> Self {
        Self::for_mode(creds.mode, creds.auth_secret.clone())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RequestVerifier::Bearer { .. } => "bearer",
            RequestVerifier::SlackSignature { .. } => "slack-signature",
        }
    }

    pub fn verify(&self, request: &InboundRequest) -> Result<(), VerificationError> {
        self.verify_at(request, chrono::Utc::now().timestamp())
    }

    /// Verify against an explicit clock (Unix seconds). Only the Slack variant reads it.
    pub fn verify_at(&self, request: &InboundRequest, now: i64) -> Result<(), VerificationError> {
        match self {
            RequestVerifier::Bearer { secret } => verify_bearer(secret, request),
            RequestVerifier::SlackSignature { secret } => {
                verify_slack_request(secret, request, now)
            }
        }
    }
}

fn verify_bearer(secret: &str, request: &InboundRequest) -> Result<(), VerificationError> {
    let header = request
        .header(AUTHORIZATION_HEADER)
        .filter(|v| !v.is_empty())
        .ok_or(VerificationError::MissingHeader(AUTHORIZATION_HEADER))?;

    let parts: Vec<&str> = header.split(' ').collect();
    let token = match parts.as_slice() {
        ["Bearer", token] => *token,
        _ => return Err(VerificationError::MalformedHeader(AUTHORIZATION_HEADER)),
    };

    if !constant_time_eq(token.as_bytes(), secret.as_bytes()) {
        return Err(VerificationError::TokenMismatch);
    }
    Ok(())
}

fn verify_slack_request(
    secret: &str,
    request: &InboundRequest,
    now: i64,
) -> Result<(), VerificationError> {
    let timestamp = request
        .header(SLACK_TIMESTAMP_HEADER)
        .filter(|v| !v.is_empty())
        .ok_or(VerificationError::MissingHeader(SLACK_TIMESTAMP_HEADER))?;
    let signature = request
        .header(SLACK_SIGNATURE_HEADER)
        .filter(|v| !v.is_empty())
        .ok_or(VerificationError::MissingHeader(SLACK_SIGNATURE_HEADER))?;
    let timestamp: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| VerificationError::MalformedHeader(SLACK_TIMESTAMP_HEADER))?;

    if now.abs_diff(timestamp) > SLACK_SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(VerificationError::SignatureInvalid("timestamp outside replay window"));
    }

    if verify_slack_signature(secret, timestamp, signature, &request.body) {
        Ok(())
    } else {
        Err(VerificationError::SignatureInvalid("signature mismatch"))
    }
}

/// Verify a `v0=<hex>` Slack signature over `v0:{timestamp}:{body}`.
pub fn verify_slack_signature(secret: &str, timestamp: i64, signature: &str, body: &[u8]) -> bool {
    let Some(hex_digest) = signature
        .strip_prefix(SLACK_SIGNATURE_VERSION)
        .and_then(|s| s.strip_prefix('='))
    else {
        return false;
    };
    let Ok(provided) = hex::decode(hex_digest) else {
        return false;
    };
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(signature_base(timestamp, body).as_bytes());
    mac.verify_slice(&provided).is_ok()
}

/// Compute the `v0=<hex>` signature Slack would send for this body.
pub fn sign_slack_request(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(signature_base(timestamp, body).as_bytes());
    format!(
        "{}={}",
        SLACK_SIGNATURE_VERSION,
        hex::encode(mac.finalize().into_bytes())
    )
}

fn signature_base(timestamp: i64, body: &[u8]) -> String {
    format!(
        "{}:{}:{}",
        SLACK_SIGNATURE_VERSION,
        timestamp,
        String::from_utf8_lossy(body)
    )
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
