//! Callback signature computation and verification.
//!
//! The platform signs callbacks with SHA-1 over the lexicographically sorted
//! concatenation of the shared token and the request parameters:
//! - URL signature: token, timestamp, nonce
//! - Message signature: token, timestamp, nonce, ciphertext

use sha1::{Digest, Sha1};
use tracing::{debug, warn};

/// Compute the platform signature over `parts`.
///
/// Parts are sorted, concatenated and hashed; the digest is lower-case hex.
pub fn sign(parts: &[&str]) -> String {
    let mut sorted = parts.to_vec();
    sorted.sort_unstable();

    let mut sha = Sha1::new();
    for part in sorted {
        sha.update(part.as_bytes());
    }
    hex::encode(sha.finalize())
}

/// Verify the `signature` query parameter of a callback.
///
/// # Arguments
///
/// * `token` - The shared token configured on the platform console
/// * `timestamp` - The 'timestamp' query parameter
/// * `nonce` - The 'nonce' query parameter
/// * `signature` - The 'signature' query parameter
/// * `skip` - Trusted callers bypass the check entirely
///
/// # Returns
///
/// `true` if the request may proceed, `false` if it must be rejected.
pub fn validate_query_signature(
    token: &str,
    timestamp: &str,
    nonce: &str,
    signature: &str,
    skip: bool,
) -> bool {
    if skip {
        debug!("query_signature_skipped");
        return true;
    }

    let expected = sign(&[token, timestamp, nonce]);
    let valid = constant_time_compare(&expected, signature);

    debug!(
        timestamp = %timestamp,
        nonce = %nonce,
        expected = %expected,
        actual = %signature,
        valid,
        "query_signature_checked"
    );

    if !valid {
        warn!(timestamp = %timestamp, nonce = %nonce, "query_signature_mismatch");
    }

    valid
}

/// Verify the `msg_signature` query parameter against an encrypted payload.
pub fn verify_message_signature(
    token: &str,
    timestamp: &str,
    nonce: &str,
    ciphertext: &str,
    msg_signature: &str,
) -> bool {
    let expected = sign(&[token, timestamp, nonce, ciphertext]);
    let valid = constant_time_compare(&expected, msg_signature);

    if !valid {
        warn!(
            timestamp = %timestamp,
            nonce = %nonce,
            expected_length = expected.len(),
            actual_length = msg_signature.len(),
            "message_signature_mismatch"
        );
    }

    valid
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
