//! Stripe-style webhook signatures.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The
//! signed message is `"<t>.<raw payload>"`, keyed with the webhook secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// Maximum age of a signed timestamp, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Reasons a signature header is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature header has no timestamp")]
    MissingTimestamp,

    #[error("Signature header has no v1 signature")]
    MissingSignature,

    #[error("Signature timestamp is not a number")]
    InvalidTimestamp,

    #[error("Signature timestamp is outside the tolerance window")]
    Expired,

    #[error("Signature mismatch")]
    Mismatch,

    #[error("Invalid signing key")]
    InvalidKey,
}

/// Checks `header` against `payload` at time `now` (unix seconds).
pub fn verify(
    secret: &[u8],
    header: &str,
    payload: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp)?;
    let within_tolerance = now
        .checked_sub(ts)
        .is_some_and(|skew| skew.unsigned_abs() <= tolerance_secs.unsigned_abs());
    if !within_tolerance {
        return Err(SignatureError::Expired);
    }

    let expected = compute(secret, timestamp, payload)?;

    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Builds a header for `payload` signed at `timestamp`.
pub fn sign(secret: &[u8], timestamp: i64, payload: &str) -> Result<String, SignatureError> {
    let signature = compute(secret, &timestamp.to_string(), payload)?;
    Ok(format!("t={timestamp},v1={signature}"))
}

fn compute(secret: &[u8], timestamp: &str, payload: &str) -> Result<String, SignatureError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
