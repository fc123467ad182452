//! Mock credential repository for testing.

use crate::error::{AuthError, Result};
use crate::providers::{CredentialRecord, CredentialRepository};
use crate::state::{CredentialId, UserId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Mock credential repository.
#[derive(Debug, Clone, Default)]
pub struct MockCredentialRepository {
    credentials: Arc<Mutex<HashMap<CredentialId, CredentialRecord>>>,
}

impl MockCredentialRepository {
    /// Create a new mock credential repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<CredentialId, CredentialRecord>>> {
        self.credentials
            .lock()
            .map_err(|_| AuthError::Internal("mock lock poisoned".into()))
    }

    /// Add or replace a credential.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the lock is poisoned.
    pub fn insert(&self, credential: CredentialRecord) -> Result<()> {
        self.lock()?.insert(credential.id.clone(), credential);
        Ok(())
    }

    /// Current state of a credential.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the lock is poisoned.
    pub fn get(&self, credential_id: &CredentialId) -> Result<Option<CredentialRecord>> {
        Ok(self.lock()?.get(credential_id).cloned())
    }
}

impl CredentialRepository for MockCredentialRepository {
    async fn list_credentials(&self, user_id: &UserId) -> Result<Vec<CredentialRecord>> {
        let mut credentials: Vec<_> = self
            .lock()?
            .values()
            .filter(|c| c.user_id == *user_id)
            .cloned()
            .collect();
        credentials.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(credentials)
    }

    async fn find_credential(&self, credential_id: &CredentialId) -> Result<Option<CredentialRecord>> {
        self.get(credential_id)
    }

    async fn create_credential(&self, credential: &CredentialRecord) -> Result<()> {
        let mut credentials = self.lock()?;
        if credentials.contains_key(&credential.id) {
            return Err(AuthError::InvalidRequest("credential already registered".into()));
        }
        credentials.insert(credential.id.clone(), credential.clone());
        Ok(())
    }

    async fn update_credential_usage(
        &self,
        credential_id: &CredentialId,
        signature_counter: u32,
        used_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut credentials = self.lock()?;
        let credential = credentials
            .get_mut(credential_id)
            .ok_or(AuthError::CredentialNotFound)?;
        credential.signature_counter = signature_counter;
        credential.last_used_at = Some(used_at);
        Ok(())
    }
}
