//! Ed25519 JSON Web Keys (RFC 8037) with RFC 7638 thumbprint key ids.

use crate::crypto;
use crate::error::{AuthError, Result};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

/// OKP JSON Web Key.
///
/// `d` is present only in the persisted private form and is never
/// serialized into a published key set.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (`OKP`).
    pub kty: String,

    /// Curve (`Ed25519`).
    pub crv: String,

    /// Public key (base64url).
    pub x: String,

    /// Private key seed (base64url), private form only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// Key id (RFC 7638 thumbprint).
    pub kid: String,

    /// Algorithm (`EdDSA`).
    pub alg: String,

    /// Public key use (`sig`).
    #[serde(rename = "use")]
    pub key_use: String,
}

impl std::fmt::Debug for Jwk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jwk")
            .field("kid", &self.kid)
            .field("x", &self.x)
            .field("d", &self.d.as_ref().map(|_| "[redacted]"))
            .finish_non_exhaustive()
    }
}

/// RFC 7638 thumbprint of an Ed25519 public key.
///
/// Members in lexicographic order, no whitespace.
#[must_use]
pub fn thumbprint(x: &str) -> String {
    crypto::sha256_base64url(format!(r#"{{"crv":"Ed25519","kty":"OKP","x":"{x}"}}"#))
}

impl Jwk {
    /// Public JWK for a verifying key.
    #[must_use]
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let x = crypto::base64url_encode(key.to_bytes());
        Self {
            kty: "OKP".into(),
            crv: "Ed25519".into(),
            kid: thumbprint(&x),
            x,
            d: None,
            alg: "EdDSA".into(),
            key_use: "sig".into(),
        }
    }

    /// Private JWK (includes `d`) for a signing key.
    #[must_use]
    pub fn from_signing_key(key: &SigningKey) -> Self {
        Self {
            d: Some(crypto::base64url_encode(key.to_bytes())),
            ..Self::from_verifying_key(&key.verifying_key())
        }
    }

    /// Copy without private material.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            d: None,
            ..self.clone()
        }
    }

    /// Re-import the verifying key.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Serialization` if the key is not a valid Ed25519
    /// JWK or the `kid` does not match its thumbprint.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        if self.kty != "OKP" || self.crv != "Ed25519" {
            return Err(AuthError::Serialization(format!(
                "unsupported key type {}/{}",
                self.kty, self.crv
            )));
        }
        if self.kid != thumbprint(&self.x) {
            return Err(AuthError::Serialization("kid does not match key".into()));
        }

        let bytes = decode_32(&self.x)?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| AuthError::Serialization(format!("invalid Ed25519 public key: {e}")))
    }

    /// Re-import the signing key.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Serialization` if `d` is missing or malformed, or
    /// does not derive the published `x`.
    pub fn signing_key(&self) -> Result<SigningKey> {
        let verifying = self.verifying_key()?;
        let d = self
            .d
            .as_deref()
            .ok_or_else(|| AuthError::Serialization("private key material missing".into()))?;

        let signing = SigningKey::from_bytes(&decode_32(d)?);
        if signing.verifying_key() != verifying {
            return Err(AuthError::Serialization(
                "private key does not match public key".into(),
            ));
        }
        Ok(signing)
    }
}

fn decode_32(value: &str) -> Result<[u8; 32]> {
    crypto::base64url_decode(value)
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .ok_or_else(|| AuthError::Serialization("expected 32 base64url bytes".into()))
}

/// Published key set (`{"keys": [...]}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// Public keys, current first.
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Find a key by id.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}
