//! Verification of the `X-Hub-Signature-256` header on webhook deliveries.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Strips the `sha256=` prefix and decodes the hex digest that follows.
/// Returns `None` for any other shape of header.
fn decode_header(header: &str) -> Option<Vec<u8>> {
    let hex_digest = header.strip_prefix(SIGNATURE_PREFIX)?;
    hex::decode(hex_digest).ok()
}

/// Checks a webhook body against its signature header. The comparison is
/// constant-time via the MAC's own verification.
pub fn verify_signature(body: &[u8], header: &str, secret: &[u8]) -> bool {
    let Some(expected) = decode_header(header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Produces the header value GitHub would send for this body and secret.
pub fn sign(body: &[u8], secret: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}
