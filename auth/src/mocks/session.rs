//! Mock token and session validators for testing.

use crate::error::{AuthError, Result};
use crate::providers::{SessionValidator, TokenValidator, ValidatedIdentity};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Table of presented value → identity, with a switchable outage.
#[derive(Debug, Clone, Default)]
struct IdentityTable {
    entries: Arc<Mutex<HashMap<String, ValidatedIdentity>>>,
    unavailable: Arc<AtomicBool>,
}

impl IdentityTable {
    fn insert(&self, key: &str, identity: ValidatedIdentity) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), identity);
        }
    }

    fn revoke(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    fn lookup(&self, key: &str) -> Result<Option<ValidatedIdentity>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::UpstreamUnavailable("mock validator offline".into()));
        }
        Ok(self
            .entries
            .lock()
            .map_err(|_| AuthError::Internal("mock lock poisoned".into()))?
            .get(key)
            .cloned())
    }
}

/// Mock bearer token validator.
#[derive(Debug, Clone, Default)]
pub struct MockTokenValidator {
    table: IdentityTable,
}

impl MockTokenValidator {
    /// Create a new mock token validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` for `identity`.
    pub fn insert(&self, token: &str, identity: ValidatedIdentity) {
        self.table.insert(token, identity);
    }

    /// Stop accepting `token`.
    pub fn revoke(&self, token: &str) {
        self.table.revoke(token);
    }

    /// Simulate an unreachable validator.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.table.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl TokenValidator for MockTokenValidator {
    async fn validate_token(&self, token: &str) -> Result<Option<ValidatedIdentity>> {
        self.table.lookup(token)
    }
}

/// Mock session validator.
#[derive(Debug, Clone, Default)]
pub struct MockSessionValidator {
    table: IdentityTable,
}

impl MockSessionValidator {
    /// Create a new mock session validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `session_id` for `identity`.
    pub fn insert(&self, session_id: &str, identity: ValidatedIdentity) {
        self.table.insert(session_id, identity);
    }

    /// Stop accepting `session_id`.
    pub fn revoke(&self, session_id: &str) {
        self.table.revoke(session_id);
    }

    /// Simulate an unreachable validator.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.table.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl SessionValidator for MockSessionValidator {
    async fn validate_session(&self, session_id: &str) -> Result<Option<ValidatedIdentity>> {
        self.table.lookup(session_id)
    }
}
