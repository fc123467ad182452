//! `WebAuthn` cryptographic verifier trait.
//!
//! CBOR decoding, attestation statement checks, and signature verification
//! live behind this trait (typically backed by a WebAuthn library). The
//! ceremony controller owns everything around it: challenge lifecycle,
//! relying-party derivation, and counter policy.

use super::CredentialRecord;
use crate::error::Result;
use crate::providers::CredentialDeviceType;
use crate::state::CredentialId;

/// Values a ceremony response must be bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedCeremony {
    /// Challenge value issued for this ceremony (base64url).
    pub challenge: String,

    /// Expected origin (e.g., `https://app.example.com`).
    pub origin: String,

    /// Expected RP ID (e.g., `app.example.com`).
    pub rp_id: String,
}

/// Outcome of verifying a registration (attestation) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationVerification {
    /// Whether the attestation verified against the expected values.
    pub verified: bool,

    /// New credential id.
    pub credential_id: CredentialId,

    /// Public key (COSE format).
    pub public_key: Vec<u8>,

    /// Initial signature counter.
    pub counter: u32,

    /// Transports reported by the client.
    pub transports: Vec<String>,

    /// Device binding.
    pub device_type: CredentialDeviceType,

    /// Backup state flag.
    pub backed_up: bool,
}

/// Outcome of verifying an authentication (assertion) response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticationVerification {
    /// Whether the signature verified against the stored public key.
    pub verified: bool,

    /// Signature counter reported by the authenticator.
    pub new_counter: u32,
}

/// `WebAuthn` verifier.
///
/// # Implementation Notes
///
/// - Implementations MUST check the challenge, origin, and RP ID hash
///   embedded in the client data / authenticator data against `expected`.
/// - Implementations do NOT apply counter policy; they report the counter
///   and the controller decides.
/// - A response that fails verification returns `Ok(verified = false)` or
///   `Err(VerificationFailed)`; both are treated as failure.
pub trait CredentialVerifier: Send + Sync {
    /// Verify a registration response (`navigator.credentials.create()` JSON).
    ///
    /// # Errors
    ///
    /// Returns error if the response is malformed or cannot be verified.
    fn verify_registration(
        &self,
        response: &serde_json::Value,
        expected: &ExpectedCeremony,
    ) -> impl std::future::Future<Output = Result<RegistrationVerification>> + Send;

    /// Verify an authentication response (`navigator.credentials.get()` JSON).
    ///
    /// # Errors
    ///
    /// Returns error if the response is malformed or cannot be verified.
    fn verify_authentication(
        &self,
        response: &serde_json::Value,
        expected: &ExpectedCeremony,
        stored: &CredentialRecord,
    ) -> impl std::future::Future<Output = Result<AuthenticationVerification>> + Send;
}
