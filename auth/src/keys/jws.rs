//! Compact JWS (`EdDSA`) signing and verification.

use crate::crypto;
use crate::error::{AuthError, Result};
use chrono::Utc;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Protected header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Always `EdDSA`.
    pub alg: String,
    /// Always `JWT`.
    pub typ: String,
    /// Signing key id.
    pub kid: String,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(crypto::base64url_encode(serde_json::to_vec(value)?))
}

fn b64d_json<T: DeserializeOwned>(segment: &str) -> Result<T> {
    let bytes = crypto::base64url_decode(segment)
        .ok_or_else(|| AuthError::InvalidToken("malformed token segment".into()))?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidToken("malformed token JSON".into()))
}

fn split(token: &str) -> Result<(&str, &str, &str)> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) => Ok((h, p, s)),
        _ => Err(AuthError::InvalidToken("expected three segments".into())),
    }
}

/// Sign `claims` as a compact JWS.
///
/// # Errors
///
/// Returns `AuthError::Serialization` if the claims cannot be encoded.
pub fn sign<C: Serialize>(key: &SigningKey, kid: &str, claims: &C) -> Result<String> {
    let header = Header {
        alg: "EdDSA".into(),
        typ: "JWT".into(),
        kid: kid.to_string(),
    };

    let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(claims)?);
    let signature = key.sign(signing_input.as_bytes());

    Ok(format!(
        "{signing_input}.{}",
        crypto::base64url_encode(signature.to_bytes())
    ))
}

/// Decode the header without verifying (to select a key by `kid`).
///
/// # Errors
///
/// Returns `AuthError::InvalidToken` if the token is malformed or not `EdDSA`.
pub fn decode_header(token: &str) -> Result<Header> {
    let (header, _, _) = split(token)?;
    let header: Header = b64d_json(header)?;
    if header.alg != "EdDSA" {
        return Err(AuthError::InvalidToken(format!(
            "unsupported alg {}",
            header.alg
        )));
    }
    Ok(header)
}

/// Verify the signature and `exp`, then decode the claims.
///
/// Tokens without a numeric `exp` claim are rejected.
///
/// # Errors
///
/// Returns `AuthError::InvalidToken` if the token is malformed, the
/// signature does not verify, or the token has expired.
pub fn verify<C: DeserializeOwned>(token: &str, key: &VerifyingKey) -> Result<C> {
    decode_header(token)?;
    let (header, payload, signature) = split(token)?;

    let signature = crypto::base64url_decode(signature)
        .and_then(|bytes| Signature::from_slice(&bytes).ok())
        .ok_or_else(|| AuthError::InvalidToken("malformed signature".into()))?;

    key.verify_strict(format!("{header}.{payload}").as_bytes(), &signature)
        .map_err(|_| AuthError::InvalidToken("signature verification failed".into()))?;

    let claims: serde_json::Value = b64d_json(payload)?;
    let exp = claims
        .get("exp")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| AuthError::InvalidToken("missing exp claim".into()))?;
    if exp <= Utc::now().timestamp() {
        return Err(AuthError::InvalidToken("token expired".into()));
    }

    serde_json::from_value(claims).map_err(|_| AuthError::InvalidToken("unexpected claims".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> SigningKey {
        SigningKey::from_bytes(&[3u8; 32])
    }

    #[test]
    fn test_sign_and_verify() {
        let exp = Utc::now().timestamp() + 60;
        let token = sign(&key(), "k1", &json!({"sub": "u1", "exp": exp})).unwrap();

        assert_eq!(decode_header(&token).unwrap().kid, "k1");
        let claims: serde_json::Value = verify(&token, &key().verifying_key()).unwrap();
        assert_eq!(claims["sub"], "u1");
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let exp = Utc::now().timestamp() + 60;
        let token = sign(&key(), "k1", &json!({"sub": "u1", "exp": exp})).unwrap();
        let (h, _, s) = split(&token).unwrap();
        let forged_payload = crypto::base64url_encode(
            serde_json::to_vec(&json!({"sub": "admin", "exp": exp})).unwrap(),
        );
        let forged = format!("{h}.{forged_payload}.{s}");

        let result: Result<serde_json::Value> = verify(&forged, &key().verifying_key());
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let exp = Utc::now().timestamp() - 1;
        let token = sign(&key(), "k1", &json!({"sub": "u1", "exp": exp})).unwrap();
        let result: Result<serde_json::Value> = verify(&token, &key().verifying_key());
        assert_eq!(result, Err(AuthError::InvalidToken("token expired".into())));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let exp = Utc::now().timestamp() + 60;
        let token = sign(&key(), "k1", &json!({"exp": exp})).unwrap();
        let other = SigningKey::from_bytes(&[4u8; 32]).verifying_key();
        let result: Result<serde_json::Value> = verify(&token, &other);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(decode_header("abc").is_err());
        assert!(decode_header("a.b.c.d").is_err());
    }
}
