//! Mock `WebAuthn` verifier for testing.
//!
//! Performs no cryptography. A response is accepted when its `challenge`
//! field equals the expected challenge and its `origin` field, if present,
//! equals the expected origin:
//!
//! ```json
//! { "id": "cred-1", "challenge": "<value>", "origin": "https://app.example", "counter": 7 }
//! ```
//!
//! A missing `counter` means `stored + 1` for assertions and `0` for
//! registrations.

use crate::error::{AuthError, Result};
use crate::providers::{
    AuthenticationVerification, CredentialDeviceType, CredentialRecord, CredentialVerifier,
    ExpectedCeremony, RegistrationVerification,
};
use crate::state::CredentialId;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mock credential verifier.
#[derive(Debug, Clone, Default)]
pub struct MockCredentialVerifier {
    reject_all: Arc<AtomicBool>,
}

impl MockCredentialVerifier {
    /// Create a new mock verifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every response come back `verified: false`.
    pub fn set_reject_all(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }

    fn matches(&self, response: &Value, expected: &ExpectedCeremony) -> bool {
        if self.reject_all.load(Ordering::SeqCst) {
            return false;
        }
        let challenge_ok =
            response.get("challenge").and_then(Value::as_str) == Some(expected.challenge.as_str());
        let origin_ok = response
            .get("origin")
            .and_then(Value::as_str)
            .is_none_or(|origin| origin == expected.origin);
        challenge_ok && origin_ok
    }
}

fn counter(response: &Value) -> Option<u32> {
    response
        .get("counter")
        .and_then(Value::as_u64)
        .and_then(|c| u32::try_from(c).ok())
}

impl CredentialVerifier for MockCredentialVerifier {
    async fn verify_registration(
        &self,
        response: &Value,
        expected: &ExpectedCeremony,
    ) -> Result<RegistrationVerification> {
        let id = response
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::InvalidRequest("attestation has no id".into()))?;

        let transports = response
            .get("transports")
            .and_then(Value::as_array)
            .map(|t| t.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default();

        Ok(RegistrationVerification {
            verified: self.matches(response, expected),
            credential_id: CredentialId::new(id),
            public_key: format!("mock-public-key:{id}").into_bytes(),
            counter: counter(response).unwrap_or(0),
            transports,
            device_type: CredentialDeviceType::MultiDevice,
            backed_up: true,
        })
    }

    async fn verify_authentication(
        &self,
        response: &Value,
        expected: &ExpectedCeremony,
        stored: &CredentialRecord,
    ) -> Result<AuthenticationVerification> {
        Ok(AuthenticationVerification {
            verified: self.matches(response, expected),
            new_counter: counter(response)
                .unwrap_or_else(|| stored.signature_counter.saturating_add(1)),
        })
    }
}
