//! Webhook signing secrets and HMAC-SHA256 payload signatures.
//!
//! Subscribers verify deliveries by recomputing the HMAC over the exact
//! request body bytes, so signing always operates on the serialized bytes
//! that go on the wire, never on a re-serialized value.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Prefix carried by every generated signing secret.
pub const SECRET_PREFIX: &str = "whsec_";

/// Number of random bytes behind a signing secret.
pub const SECRET_ENTROPY_BYTES: usize = 32;

/// Number of trailing characters of a secret kept as an audit hint.
const SECRET_HINT_LENGTH: usize = 4;

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Secret generation
// ---------------------------------------------------------------------------

/// Generate a new random signing secret.
///
/// `whsec_` followed by 32 random bytes encoded as base64url without
/// padding (43 characters).
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_ENTROPY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    format!("{SECRET_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// The last few characters of a secret, safe to keep in metadata so an
/// operator can tell which secret a receiver was configured with.
pub fn secret_hint(secret: &str) -> String {
    let start = secret.len().saturating_sub(SECRET_HINT_LENGTH);
    secret.get(start..).unwrap_or_default().to_string()
}

// ---------------------------------------------------------------------------
// HMAC signing
// ---------------------------------------------------------------------------

/// Compute the HMAC-SHA256 of `payload` keyed with `secret`, as lowercase hex.
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac = mac_for(secret);
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex signature against `payload` in constant time.
///
/// Returns `false` for malformed hex as well as for mismatches.
pub fn verify(payload: &[u8], signature_hex: &str, secret: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac = mac_for(secret);
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

fn mac_for(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
