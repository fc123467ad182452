//! Passkey credential repository trait.

use super::CredentialRecord;
use crate::error::Result;
use crate::state::{CredentialId, UserId};
use chrono::{DateTime, Utc};

/// Credential CRUD against the persistence service.
pub trait CredentialRepository: Send + Sync {
    /// List a user's registered credentials.
    ///
    /// Used for registration exclude-lists and authentication allow-lists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the service is unreachable.
    fn list_credentials(
        &self,
        user_id: &UserId,
    ) -> impl std::future::Future<Output = Result<Vec<CredentialRecord>>> + Send;

    /// Get a credential by id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the service is unreachable.
    fn find_credential(
        &self,
        credential_id: &CredentialId,
    ) -> impl std::future::Future<Output = Result<Option<CredentialRecord>>> + Send;

    /// Persist a newly registered credential.
    ///
    /// # Errors
    ///
    /// Returns error if the credential id already exists or the service is unreachable.
    fn create_credential(
        &self,
        credential: &CredentialRecord,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Record a verified authentication: new counter and last-used time.
    ///
    /// # Errors
    ///
    /// Returns error if the credential is missing or the service is unreachable.
    fn update_credential_usage(
        &self,
        credential_id: &CredentialId,
        signature_counter: u32,
        used_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
