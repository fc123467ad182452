//! Mock user repository for testing.

use crate::error::{AuthError, Result};
use crate::providers::{User, UserRepository};
use crate::state::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock user repository.
///
/// Uses in-memory storage for testing.
#[derive(Debug, Clone, Default)]
pub struct MockUserRepository {
    users: Arc<Mutex<HashMap<UserId, User>>>,
}

impl MockUserRepository {
    /// Create a new mock user repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the lock is poisoned.
    pub fn insert(&self, user: User) -> Result<()> {
        self.users
            .lock()
            .map_err(|_| AuthError::Internal("mock lock poisoned".into()))?
            .insert(user.id.clone(), user);
        Ok(())
    }
}

impl UserRepository for MockUserRepository {
    async fn find_user_by_id(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .map_err(|_| AuthError::Internal("mock lock poisoned".into()))?
            .get(user_id)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .map_err(|_| AuthError::Internal("mock lock poisoned".into()))?
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}
