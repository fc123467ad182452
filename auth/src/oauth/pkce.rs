//! PKCE (RFC 7636) and anti-CSRF state tokens.
//!
//! Only the `S256` method is supported; `plain` offers no protection against
//! an intercepted authorization request.

use crate::constants::{entropy, pkce};
use crate::crypto;
use crate::error::{AuthError, Result};

/// PKCE verifier/challenge pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    /// Secret held by the client until code exchange.
    pub code_verifier: String,

    /// `base64url(SHA256(code_verifier))`, sent with the authorization request.
    pub code_challenge: String,

    /// Always `S256`.
    pub method: &'static str,
}

/// Generate a PKCE pair from 32 random bytes (43-character verifier).
///
/// # Examples
///
/// ```
/// use passgate_auth::oauth::pkce::{generate_pair, verify_challenge};
///
/// let pair = generate_pair();
/// assert_eq!(pair.code_verifier.len(), 43);
/// assert!(verify_challenge(&pair.code_verifier, &pair.code_challenge));
/// ```
#[must_use]
pub fn generate_pair() -> PkcePair {
    let code_verifier = crypto::random_token(entropy::VERIFIER_BYTES);
    let code_challenge = challenge_for(&code_verifier);
    PkcePair {
        code_verifier,
        code_challenge,
        method: pkce::METHOD_S256,
    }
}

/// Generate an opaque `state` token.
#[must_use]
pub fn generate_state() -> String {
    crypto::random_token(entropy::STATE_BYTES)
}

/// `S256` challenge for a verifier.
#[must_use]
pub fn challenge_for(code_verifier: &str) -> String {
    crypto::sha256_base64url(code_verifier)
}

/// Check a verifier's length and charset (`[A-Za-z0-9-._~]{43,128}`).
///
/// # Errors
///
/// Returns `AuthError::InvalidCodeVerifier` if the verifier is malformed.
pub fn validate_verifier(code_verifier: &str) -> Result<()> {
    let len_ok = (pkce::VERIFIER_MIN_LEN..=pkce::VERIFIER_MAX_LEN).contains(&code_verifier.len());
    let charset_ok = code_verifier
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'));

    if len_ok && charset_ok {
        Ok(())
    } else {
        Err(AuthError::InvalidCodeVerifier)
    }
}

/// Recompute the challenge from `code_verifier` and compare.
///
/// Malformed verifiers never match.
#[must_use]
pub fn verify_challenge(code_verifier: &str, code_challenge: &str) -> bool {
    validate_verifier(code_verifier).is_ok()
        && crypto::constant_time_str_eq(&challenge_for(code_verifier), code_challenge)
}

/// Compare a returned `state` against the stored one in constant time.
#[must_use]
pub fn verify_state(received: &str, stored: &str) -> bool {
    crypto::constant_time_str_eq(received, stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rfc7636_vector() {
        assert!(verify_challenge(
            "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk",
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        ));
    }

    #[test]
    fn test_pairs_are_unique() {
        let a = generate_pair();
        let b = generate_pair();
        assert_ne!(a.code_verifier, b.code_verifier);
        assert_eq!(a.method, "S256");
    }

    #[test]
    fn test_validate_verifier_bounds() {
        assert_eq!(validate_verifier(&"a".repeat(42)), Err(AuthError::InvalidCodeVerifier));
        assert!(validate_verifier(&"a".repeat(43)).is_ok());
        assert!(validate_verifier(&"a".repeat(128)).is_ok());
        assert_eq!(validate_verifier(&"a".repeat(129)), Err(AuthError::InvalidCodeVerifier));
        assert_eq!(
            validate_verifier(&format!("{}+", "a".repeat(43))),
            Err(AuthError::InvalidCodeVerifier)
        );
    }

    #[test]
    fn test_state_comparison() {
        let state = generate_state();
        assert!(verify_state(&state, &state));
        assert!(!verify_state(&state, &generate_state()));
        assert!(!verify_state("", &state));
    }

    proptest! {
        #[test]
        fn prop_verifier_reproduces_challenge(verifier in "[A-Za-z0-9._~-]{43,128}") {
            prop_assert!(verify_challenge(&verifier, &challenge_for(&verifier)));
        }

        #[test]
        fn prop_single_char_change_breaks_challenge(
            verifier in "[A-Za-z0-9]{43,128}",
            index in any::<prop::sample::Index>(),
        ) {
            let challenge = challenge_for(&verifier);
            let mut bytes = verifier.into_bytes();
            let i = index.index(bytes.len());
            bytes[i] = if bytes[i] == b'x' { b'y' } else { b'x' };
            let altered = String::from_utf8(bytes).unwrap();
            prop_assert!(!verify_challenge(&altered, &challenge));
        }
    }
}
