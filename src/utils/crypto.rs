//! HMAC signatures for outbound webhook bodies

use crate::utils::error::{Result, WebhookError};
use hmac::{Hmac, Mac, digest::KeyInit as HmacKeyInit};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by every signature header value
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Create a hex encoded HMAC-SHA256 over raw bytes
pub fn create_hmac_signature(secret: &str, data: &[u8]) -> Result<String> {
    let mut mac = <HmacSha256 as HmacKeyInit>::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::Crypto(format!("Invalid HMAC key: {}", e)))?;

    mac.update(data);
    let result = mac.finalize();
    Ok(hex::encode(result.into_bytes()))
}

/// Build the signature header value for a webhook body
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String> {
    Ok(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        create_hmac_signature(secret, body)?
    ))
}

/// Verify a signature header value as produced by [`sign_payload`]
///
/// Receivers can use this to authenticate a delivery. A header without the
/// `sha256=` prefix never verifies.
pub fn verify_payload_signature(secret: &str, body: &[u8], header_value: &str) -> Result<bool> {
    let Some(signature) = header_value.strip_prefix(SIGNATURE_PREFIX) else {
        return Ok(false);
    };
    let expected = create_hmac_signature(secret, body)?;
    Ok(constant_time_eq(&expected, signature))
}

/// Constant-time string comparison
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.bytes().zip(b.bytes()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}
