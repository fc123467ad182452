//! Bearer token and session validator traits.
//!
//! Both credential kinds are minted and tracked by the persistence service;
//! the resolver only asks whether a presented value is currently valid.

use super::ValidatedIdentity;
use crate::error::Result;

/// Validates opaque bearer tokens presented by native/mobile clients.
pub trait TokenValidator: Send + Sync {
    /// Validate a bearer token.
    ///
    /// # Returns
    ///
    /// - `Some(identity)` if the token is valid and unexpired
    /// - `None` if the token is unknown, revoked, or expired
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the service is unreachable.
    fn validate_token(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Option<ValidatedIdentity>>> + Send;
}

/// Validates session identifiers carried in the browser session cookie.
pub trait SessionValidator: Send + Sync {
    /// Validate a session id.
    ///
    /// # Returns
    ///
    /// - `Some(identity)` if the session is live
    /// - `None` if the session is unknown, revoked, or expired
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the service is unreachable.
    fn validate_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ValidatedIdentity>>> + Send;
}
