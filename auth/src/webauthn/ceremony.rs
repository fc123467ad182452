//! Passkey registration and authentication ceremonies.
//!
//! # Flow
//!
//! ```text
//! options ──► ChallengeStore::issue ──► client authenticator
//!                                              │
//! finish  ◄── ChallengeStore::consume ◄────────┘
//!    │
//!    ├─► CredentialVerifier (signature / attestation)
//!    ├─► counter policy (authentication only)
//!    └─► CredentialRepository (persist / update usage)
//! ```
//!
//! The challenge is consumed before any verification work, so it is single
//! use whatever the outcome. Every failure is fail-closed: a persistence
//! error denies the ceremony.

use super::options::{
    AuthenticatorSelection, CeremonyOptions, CreationOptions, CredentialDescriptor,
    CredentialType, PubKeyCredParam, RequestOptions, ResidentKeyRequirement, RpEntity,
    UserEntity,
};
use super::relying_party::RelyingParty;
use crate::challenge::{Challenge, ChallengeKind, ChallengeStore};
use crate::config::PasskeyConfig;
use crate::crypto;
use crate::error::{AuthError, Result};
use crate::providers::{
    CredentialRecord, CredentialRepository, CredentialVerifier, ExpectedCeremony,
    KeyValueStore, User, UserRepository,
};
use crate::state::{CredentialId, UserId};
use chrono::Utc;

/// Signature counter policy.
///
/// A reported counter is accepted when it strictly exceeds the stored one.
/// Multi-device passkeys keep both at zero, which is also accepted. Anything
/// else indicates a cloned authenticator or a replayed assertion.
///
/// # Examples
///
/// ```
/// use passgate_auth::webauthn::counter_advanced;
///
/// assert!(counter_advanced(5, 6));
/// assert!(counter_advanced(0, 0));
/// assert!(!counter_advanced(5, 5));
/// assert!(!counter_advanced(5, 0));
/// ```
#[must_use]
pub const fn counter_advanced(stored: u32, reported: u32) -> bool {
    reported > stored || (reported == 0 && stored == 0)
}

/// Successful passkey sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCredential {
    /// Authenticated user.
    pub user: User,

    /// Credential used.
    pub credential_id: CredentialId,

    /// Counter persisted after this assertion.
    pub signature_counter: u32,
}

/// `WebAuthn` ceremony controller.
///
/// # Type Parameters
///
/// - `K`: Key/value store backing the challenge store
/// - `V`: Cryptographic verifier
/// - `U`: User repository
/// - `C`: Credential repository
pub struct CeremonyController<K, V, U, C> {
    challenges: ChallengeStore<K>,
    verifier: V,
    users: U,
    credentials: C,
    config: PasskeyConfig,
}

impl<K, V, U, C> CeremonyController<K, V, U, C>
where
    K: KeyValueStore,
    V: CredentialVerifier,
    U: UserRepository,
    C: CredentialRepository,
{
    /// Create a ceremony controller.
    #[must_use]
    pub fn new(store: K, verifier: V, users: U, credentials: C, config: PasskeyConfig) -> Self {
        Self {
            challenges: ChallengeStore::new(store, config.challenge_ttl),
            verifier,
            users,
            credentials,
            config,
        }
    }

    /// Passkey configuration.
    #[must_use]
    pub const fn config(&self) -> &PasskeyConfig {
        &self.config
    }

    /// Derive the relying party for a request.
    ///
    /// # Errors
    ///
    /// See [`RelyingParty::for_request`].
    pub fn relying_party(&self, host: &str, scheme: &str) -> Result<RelyingParty> {
        RelyingParty::for_request(host, scheme, &self.config)
    }

    fn expected(rp: &RelyingParty, challenge: &Challenge) -> ExpectedCeremony {
        ExpectedCeremony {
            challenge: challenge.value.clone(),
            origin: rp.origin.clone(),
            rp_id: rp.id.clone(),
        }
    }

    /// Build registration options for an existing user.
    ///
    /// The user's current credentials are listed in `excludeCredentials` so an
    /// authenticator never registers twice for the same account.
    ///
    /// # Errors
    ///
    /// - `AuthError::UserNotFound` if the user does not exist
    /// - `AuthError::UpstreamUnavailable` if the persistence service or store is down
    pub async fn registration_options(
        &self,
        rp: &RelyingParty,
        user_id: &UserId,
    ) -> Result<CeremonyOptions<CreationOptions>> {
        let user = self
            .users
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let existing = self.credentials.list_credentials(user_id).await?;

        let challenge = self
            .challenges
            .issue(ChallengeKind::Registration, Some(user_id.clone()))
            .await?;

        let options = CreationOptions {
            rp: RpEntity {
                id: rp.id.clone(),
                name: rp.name.clone(),
            },
            user: UserEntity {
                id: crypto::base64url_encode(user.id.as_str()),
                name: user.email.clone(),
                display_name: user.display_name_or_email().to_string(),
            },
            challenge: challenge.value,
            pub_key_cred_params: self
                .config
                .algorithms
                .iter()
                .map(|&alg| PubKeyCredParam {
                    kind: CredentialType::PublicKey,
                    alg,
                })
                .collect(),
            timeout: self.config.timeout_ms,
            exclude_credentials: existing.iter().map(CredentialDescriptor::from).collect(),
            authenticator_selection: AuthenticatorSelection {
                authenticator_attachment: self.config.attachment,
                resident_key: self.config.resident_key,
                require_resident_key: self.config.resident_key
                    == ResidentKeyRequirement::Required,
                user_verification: self.config.user_verification,
            },
            attestation: "none".to_string(),
        };

        tracing::info!(
            user_id = %user_id,
            rp_id = %rp.id,
            excluded = options.exclude_credentials.len(),
            "Built passkey registration options"
        );

        Ok(CeremonyOptions {
            challenge_id: challenge.id,
            public_key: options,
        })
    }

    /// Build authentication options.
    ///
    /// With an email hint for a known user, the allow-list holds that user's
    /// credentials and the challenge is bound to them. Without a hint, or for
    /// an unknown email, the allow-list is empty and any discoverable
    /// credential may answer; the response shape is the same either way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the persistence service or store is down.
    pub async fn authentication_options(
        &self,
        rp: &RelyingParty,
        email_hint: Option<&str>,
    ) -> Result<CeremonyOptions<RequestOptions>> {
        let user = match email_hint.map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) => self.users.find_user_by_email(email).await?,
            None => None,
        };

        let allow_credentials = match &user {
            Some(user) => self
                .credentials
                .list_credentials(&user.id)
                .await?
                .iter()
                .map(CredentialDescriptor::from)
                .collect(),
            None => Vec::new(),
        };

        let challenge = self
            .challenges
            .issue(ChallengeKind::Authentication, user.map(|u| u.id))
            .await?;

        tracing::info!(
            rp_id = %rp.id,
            allowed = allow_credentials.len(),
            discoverable = allow_credentials.is_empty(),
            "Built passkey authentication options"
        );

        Ok(CeremonyOptions {
            challenge_id: challenge.id,
            public_key: RequestOptions {
                challenge: challenge.value,
                timeout: self.config.timeout_ms,
                rp_id: rp.id.clone(),
                allow_credentials,
                user_verification: self.config.user_verification,
            },
        })
    }

    /// Verify a registration response and persist the new credential.
    ///
    /// # Errors
    ///
    /// - Challenge errors from [`ChallengeStore::consume`]
    /// - `AuthError::VerificationFailed` if the attestation does not verify
    /// - `AuthError::UpstreamUnavailable` if the credential cannot be persisted
    pub async fn finish_registration(
        &self,
        rp: &RelyingParty,
        challenge_id: &str,
        response: &serde_json::Value,
    ) -> Result<CredentialRecord> {
        let challenge = self
            .challenges
            .consume(challenge_id, ChallengeKind::Registration)
            .await?;

        let user_id = challenge.bound_user_id.clone().ok_or_else(|| {
            AuthError::Internal("registration challenge without a bound user".into())
        })?;

        let expected = Self::expected(rp, &challenge);
        let verification = match self.verifier.verify_registration(response, &expected).await {
            Ok(v) if v.verified => v,
            Ok(_) => {
                tracing::warn!(user_id = %user_id, rp_id = %rp.id, "Passkey attestation rejected");
                return Err(AuthError::VerificationFailed("attestation not verified".into()));
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    security_event = e.is_security_issue(),
                    "Passkey attestation verification failed"
                );
                return Err(e);
            }
        };

        let record = CredentialRecord {
            id: verification.credential_id,
            user_id,
            public_key: verification.public_key,
            signature_counter: verification.counter,
            transports: verification.transports,
            device_type: verification.device_type,
            backed_up: verification.backed_up,
            created_at: Utc::now(),
            last_used_at: None,
        };

        self.credentials.create_credential(&record).await?;

        tracing::info!(
            user_id = %record.user_id,
            credential_id = %record.id,
            "Registered passkey"
        );

        Ok(record)
    }

    /// Verify an authentication response.
    ///
    /// The stored counter and last-used time are updated only after the
    /// signature and the counter policy both pass.
    ///
    /// # Errors
    ///
    /// - Challenge errors from [`ChallengeStore::consume`]
    /// - `AuthError::InvalidRequest` if the response carries no credential id
    /// - `AuthError::CredentialNotFound` if the credential is unknown
    /// - `AuthError::CredentialUserMismatch` if the challenge was bound to another user
    /// - `AuthError::VerificationFailed` if the assertion does not verify
    /// - `AuthError::CounterReplay` if the counter did not advance
    pub async fn finish_authentication(
        &self,
        rp: &RelyingParty,
        challenge_id: &str,
        response: &serde_json::Value,
    ) -> Result<AuthenticatedCredential> {
        let challenge = self
            .challenges
            .consume(challenge_id, ChallengeKind::Authentication)
            .await?;

        let credential_id = response
            .get("id")
            .and_then(serde_json::Value::as_str)
            .filter(|id| !id.is_empty())
            .map(CredentialId::new)
            .ok_or_else(|| AuthError::InvalidRequest("response has no credential id".into()))?;

        let stored = self
            .credentials
            .find_credential(&credential_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(credential_id = %credential_id, "Credential not found");
                AuthError::CredentialNotFound
            })?;

        if let Some(bound) = &challenge.bound_user_id {
            if *bound != stored.user_id {
                tracing::warn!(
                    credential_id = %credential_id,
                    security_event = true,
                    "Credential presented for a different user's challenge"
                );
                return Err(AuthError::CredentialUserMismatch);
            }
        }

        let expected = Self::expected(rp, &challenge);
        let verification = match self
            .verifier
            .verify_authentication(response, &expected, &stored)
            .await
        {
            Ok(v) if v.verified => v,
            Ok(_) => {
                tracing::warn!(credential_id = %credential_id, "Passkey assertion rejected");
                return Err(AuthError::VerificationFailed("assertion not verified".into()));
            }
            Err(e) => {
                tracing::warn!(
                    credential_id = %credential_id,
                    error = %e,
                    security_event = e.is_security_issue(),
                    "Passkey assertion verification failed"
                );
                return Err(e);
            }
        };

        if !counter_advanced(stored.signature_counter, verification.new_counter) {
            tracing::error!(
                credential_id = %credential_id,
                user_id = %stored.user_id,
                stored = stored.signature_counter,
                reported = verification.new_counter,
                security_event = true,
                "Signature counter did not advance; possible cloned authenticator"
            );
            return Err(AuthError::CounterReplay {
                stored: stored.signature_counter,
                reported: verification.new_counter,
            });
        }

        self.credentials
            .update_credential_usage(&credential_id, verification.new_counter, Utc::now())
            .await?;

        let user = self
            .users
            .find_user_by_id(&stored.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(
            user_id = %user.id,
            credential_id = %credential_id,
            counter = verification.new_counter,
            "Passkey authentication succeeded"
        );

        Ok(AuthenticatedCredential {
            user,
            credential_id,
            signature_counter: verification.new_counter,
        })
    }
}
