//! Webhook signature verification (HMAC-SHA256 over the raw body).
//!
//! Bitbucket-style webhooks carry a hex digest in one of two headers, and
//! senders disagree on whether the value is `sha256=`-prefixed or bare.
//! Both forms are accepted; comparison is constant-time via `Mac::verify_slice`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Recognized signature headers, checked in order (first present wins).
pub const SIGNATURE_HEADERS: [&str; 2] = ["X-Hub-Signature-256", "X-Hub-Signature"];

const SHA256_PREFIX: &str = "sha256=";

/// Outcome of a signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// No secret configured: verification is skipped (permissive mode).
    /// The caller should log this at warn level.
    Skipped,
    /// Signature matched the body.
    Accepted,
    /// Missing, malformed or mismatching signature.
    Rejected(&'static str),
}

impl SignatureCheck {
    pub fn is_rejected(&self) -> bool {
        matches!(self, SignatureCheck::Rejected(_))
    }
}

/// Verify `header` against the HMAC-SHA256 of `body` keyed by `secret`.
///
/// Accepts both the bare hex digest and the `sha256=`-prefixed form.
/// Malformed input (bad hex, garbage header) rejects, never panics.
pub fn verify(secret: &str, body: &[u8], header: Option<&str>) -> SignatureCheck {
    if secret.is_empty() {
        return SignatureCheck::Skipped;
    }
    let Some(header) = header else {
        return SignatureCheck::Rejected("No signature provided");
    };

    let header = header.trim();
    let bare = header.strip_prefix(SHA256_PREFIX).unwrap_or(header);

    // Senders vary: some put `sha256=<hex>` in the header, some bare hex.
    // Try both interpretations against the expected digest.
    for candidate in [bare, header] {
        if verify_hex(secret, body, candidate) {
            return SignatureCheck::Accepted;
        }
    }
    SignatureCheck::Rejected("Invalid signature")
}

/// Constant-time comparison of one hex candidate against the body HMAC.
fn verify_hex(secret: &str, body: &[u8], candidate: &str) -> bool {
    let Ok(digest) = hex::decode(candidate) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&digest).is_ok()
}

/// Hex HMAC-SHA256 digest of `body` keyed by `secret`.
///
/// Shared by verification tests and by callers that need to sign payloads.
pub fn expected_digest(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
