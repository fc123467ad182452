//! Ceremony option payloads.
//!
//! Serialize to the standard `PublicKeyCredentialCreationOptionsJSON` and
//! `PublicKeyCredentialRequestOptionsJSON` shapes, so browsers can pass them
//! through `PublicKeyCredential.parseCreationOptionsFromJSON()` and friends.

use crate::providers::CredentialRecord;
use serde::{Deserialize, Serialize};

/// Discoverable (resident) credential requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKeyRequirement {
    /// Prefer a server-side credential.
    Discouraged,
    /// Create a discoverable credential if possible.
    Preferred,
    /// Fail unless a discoverable credential can be created.
    Required,
}

/// User verification (PIN/biometric) requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    /// Do not verify the user.
    Discouraged,
    /// Verify when the authenticator supports it.
    Preferred,
    /// Fail unless the user is verified.
    Required,
}

/// Authenticator attachment modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    /// Built into the device (Touch ID, Windows Hello, Android).
    Platform,
    /// Roaming authenticator (security key, phone via hybrid).
    CrossPlatform,
}

/// Relying party entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpEntity {
    /// RP id (effective domain).
    pub id: String,
    /// Display name.
    pub name: String,
}

/// User entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// User handle (base64url of the user id bytes).
    pub id: String,
    /// Account name (email).
    pub name: String,
    /// Display name.
    pub display_name: String,
}

/// Acceptable public key algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKeyCredParam {
    /// Always `public-key`.
    #[serde(rename = "type")]
    pub kind: CredentialType,
    /// COSE algorithm identifier.
    pub alg: i64,
}

/// Credential type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialType {
    /// The only defined type.
    #[serde(rename = "public-key")]
    PublicKey,
}

/// Reference to an existing credential (exclude/allow lists).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDescriptor {
    /// Always `public-key`.
    #[serde(rename = "type")]
    pub kind: CredentialType,
    /// Credential id (base64url).
    pub id: String,
    /// Transport hints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<String>,
}

impl From<&CredentialRecord> for CredentialDescriptor {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            kind: CredentialType::PublicKey,
            id: record.id.as_str().to_string(),
            transports: record.transports.clone(),
        }
    }
}

/// Authenticator selection criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    /// Attachment preference; omitted to allow any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,
    /// Resident key requirement.
    pub resident_key: ResidentKeyRequirement,
    /// Legacy boolean mirror of `resident_key == required`.
    pub require_resident_key: bool,
    /// User verification requirement.
    pub user_verification: UserVerification,
}

/// Registration (`create`) options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationOptions {
    /// Relying party.
    pub rp: RpEntity,
    /// Account being registered.
    pub user: UserEntity,
    /// Challenge value (base64url).
    pub challenge: String,
    /// Algorithms in preference order.
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    /// Client timeout hint in milliseconds.
    pub timeout: u32,
    /// Credentials the user already has; the authenticator refuses to
    /// create a duplicate.
    pub exclude_credentials: Vec<CredentialDescriptor>,
    /// Authenticator selection.
    pub authenticator_selection: AuthenticatorSelection,
    /// Attestation conveyance (`none`).
    pub attestation: String,
}

/// Authentication (`get`) options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    /// Challenge value (base64url).
    pub challenge: String,
    /// Client timeout hint in milliseconds.
    pub timeout: u32,
    /// RP id.
    pub rp_id: String,
    /// Allowed credentials; empty permits discoverable credentials.
    pub allow_credentials: Vec<CredentialDescriptor>,
    /// User verification requirement.
    pub user_verification: UserVerification,
}

/// Options payload plus the challenge id the client must echo back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CeremonyOptions<T> {
    /// Challenge lookup id.
    pub challenge_id: String,
    /// Options for `navigator.credentials`.
    pub public_key: T,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_creation_options_json_shape() {
        let options = CreationOptions {
            rp: RpEntity {
                id: "example.com".into(),
                name: "Example".into(),
            },
            user: UserEntity {
                id: "dTE".into(),
                name: "a@example.com".into(),
                display_name: "Alice".into(),
            },
            challenge: "abc".into(),
            pub_key_cred_params: vec![PubKeyCredParam {
                kind: CredentialType::PublicKey,
                alg: -7,
            }],
            timeout: 60_000,
            exclude_credentials: vec![],
            authenticator_selection: AuthenticatorSelection {
                authenticator_attachment: Some(AuthenticatorAttachment::CrossPlatform),
                resident_key: ResidentKeyRequirement::Required,
                require_resident_key: true,
                user_verification: UserVerification::Preferred,
            },
            attestation: "none".into(),
        };

        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(value["user"]["displayName"], "Alice");
        assert_eq!(value["pubKeyCredParams"][0], json!({"type": "public-key", "alg": -7}));
        assert_eq!(
            value["authenticatorSelection"]["authenticatorAttachment"],
            "cross-platform"
        );
        assert_eq!(value["authenticatorSelection"]["residentKey"], "required");
        assert_eq!(value["excludeCredentials"], json!([]));
    }

    #[test]
    fn test_descriptor_omits_empty_transports() {
        let descriptor = CredentialDescriptor {
            kind: CredentialType::PublicKey,
            id: "cred".into(),
            transports: vec![],
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value, json!({"type": "public-key", "id": "cred"}));
    }
}
