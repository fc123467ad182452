//! User repository trait.

use super::User;
use crate::error::Result;
use crate::state::UserId;

/// User lookup against the persistence service.
///
/// Query-only: profile writes happen outside this core.
pub trait UserRepository: Send + Sync {
    /// Get user by ID.
    ///
    /// # Returns
    ///
    /// `None` if no such user exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the service is unreachable.
    fn find_user_by_id(
        &self,
        user_id: &UserId,
    ) -> impl std::future::Future<Output = Result<Option<User>>> + Send;

    /// Get user by email.
    ///
    /// # Returns
    ///
    /// `None` if no such user exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the service is unreachable.
    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>>> + Send;
}
