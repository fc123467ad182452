//! Secret and key utilities.
//!
//! Everything that touches randomness, hashing, encoding, or secret
//! comparison goes through here so the rest of the crate never reaches for
//! a variable-time `==` on secret material.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Fill `len` bytes from the operating system CSPRNG.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// 32 random bytes, sized for key seeds.
#[must_use]
pub fn random_seed() -> [u8; 32] {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    seed
}

/// Random token of `len` bytes, base64url encoded without padding.
///
/// # Examples
///
/// ```
/// use passgate_auth::crypto::random_token;
///
/// // 32 bytes → 43 base64url characters
/// assert_eq!(random_token(32).len(), 43);
/// ```
#[must_use]
pub fn random_token(len: usize) -> String {
    base64url_encode(random_bytes(len))
}

/// Random opaque identifier (UUID v4, hyphenated).
#[must_use]
pub fn random_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// SHA-256 digest.
#[must_use]
pub fn sha256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Sha256::digest(data.as_ref()).into()
}

/// SHA-256 digest, base64url encoded without padding.
#[must_use]
pub fn sha256_base64url(data: impl AsRef<[u8]>) -> String {
    base64url_encode(sha256(data))
}

/// Base64url encode without padding.
#[must_use]
pub fn base64url_encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Base64url decode (padding not accepted).
///
/// Returns `None` on malformed input.
#[must_use]
pub fn base64url_decode(data: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(data).ok()
}

/// Constant-time equality for secret strings.
///
/// Scans the full length of equal-length inputs before deciding; the only
/// early exit is on differing lengths, which are not secret for the values
/// this is used on (fixed-size encoded tokens).
///
/// # Examples
///
/// ```
/// use passgate_auth::crypto::constant_time_str_eq;
///
/// assert!(constant_time_str_eq("abc", "abc"));
/// assert!(!constant_time_str_eq("abc", "abd"));
/// assert!(!constant_time_str_eq("abc", "abcd"));
/// ```
#[must_use]
pub fn constant_time_str_eq(a: &str, b: &str) -> bool {
    constant_time_eq::constant_time_eq(a.as_bytes(), b.as_bytes())
}
