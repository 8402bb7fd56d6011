//! Webhook verification
//!
//! Two independent checks: the subscription handshake (GET with a shared
//! verify token) and optional HMAC-SHA256 payload signatures on POST bodies.
//! Token comparison goes through SHA-256 digests so the comparison time does
//! not depend on where the strings diverge.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Query parameters of the subscription handshake
#[derive(Debug, serde::Deserialize)]
pub struct VerifyParams {
    pub mode: String,
    pub verify_token: String,
    pub challenge: String,
}

/// Check a subscription handshake against the configured token.
pub fn verify_subscription(params: &VerifyParams, expected_token: &str) -> bool {
    if params.mode != "subscribe" {
        debug!(mode = %params.mode, "Handshake with unexpected mode");
        return false;
    }
    constant_time_token_eq(&params.verify_token, expected_token)
}

/// Compare tokens by their SHA-256 digests. Digest comparison is fixed-length
/// and fixed-time regardless of the supplied token.
fn constant_time_token_eq(supplied: &str, expected: &str) -> bool {
    let supplied_digest = Sha256::digest(supplied.as_bytes());
    let expected_digest = Sha256::digest(expected.as_bytes());
    supplied_digest == expected_digest
}

/// Verify an `X-Hub-Signature-256` header against the raw request body.
///
/// The header value is `sha256=<hex digest>`.
///
/// # Errors
///
/// Returns `InvalidSignature` when the header is malformed or the digest does
/// not match.
pub fn verify_hmac_signature(
    payload: &[u8],
    signature: &str,
    secret: &str,
) -> Result<(), WebhookError> {
    let hex_digest = signature.strip_prefix("sha256=").ok_or_else(|| {
        WebhookError::InvalidSignature("signature must use the sha256= prefix".to_string())
    })?;

    let expected = hex::decode(hex_digest)
        .map_err(|e| WebhookError::InvalidSignature(format!("invalid hex digest: {}", e)))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::InvalidSignature(format!("invalid secret: {}", e)))?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::InvalidSignature("signature mismatch".to_string()))
}

/// Produce the `X-Hub-Signature-256` value for a payload. Used by tests and
/// local tooling.
pub fn generate_hmac_signature(payload: &[u8], secret: &str) -> Result<String, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::InvalidSignature(format!("invalid secret: {}", e)))?;
    mac.update(payload);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_accepts_matching_token() {
        let params = VerifyParams {
            mode: "subscribe".to_string(),
            verify_token: "hunter22".to_string(),
            challenge: "1158201444".to_string(),
        };
        assert!(verify_subscription(&params, "hunter22"));
    }

    #[test]
    fn handshake_rejects_wrong_token_or_mode() {
        let params = VerifyParams {
            mode: "subscribe".to_string(),
            verify_token: "wrong".to_string(),
            challenge: "x".to_string(),
        };
        assert!(!verify_subscription(&params, "hunter22"));

        let params = VerifyParams {
            mode: "unsubscribe".to_string(),
            verify_token: "hunter22".to_string(),
            challenge: "x".to_string(),
        };
        assert!(!verify_subscription(&params, "hunter22"));
    }

    #[test]
    fn hmac_round_trip() {
        let payload = br#"{"entry":[]}"#;
        let signature = generate_hmac_signature(payload, "secret-key").unwrap();
        assert!(signature.starts_with("sha256="));
        verify_hmac_signature(payload, &signature, "secret-key").unwrap();
    }

    #[test]
    fn hmac_rejects_tampered_payload() {
        let signature = generate_hmac_signature(b"original", "secret-key").unwrap();
        let result = verify_hmac_signature(b"tampered", &signature, "secret-key");
        assert!(matches!(result, Err(WebhookError::InvalidSignature(_))));
    }

    #[test]
    fn hmac_rejects_missing_prefix() {
        let result = verify_hmac_signature(b"payload", "deadbeef", "secret-key");
        assert!(matches!(result, Err(WebhookError::InvalidSignature(_))));
    }
}
