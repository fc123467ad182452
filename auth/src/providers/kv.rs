//! Key/value store trait.
//!
//! The one storage seam for short-lived, single-use, and counter state:
//! ceremony challenges, authorization codes, rate-limit windows, and the
//! persisted signing keyset.
//!
//! # Security
//!
//! Single-use values rely on [`KeyValueStore::take`] being an atomic
//! get-and-delete. Two concurrent `take` calls for the same key must never
//! both observe the value.
//!
//! # Implementation
//!
//! **Production (multi-instance)**: `Redis` (`SET PX`, `SET NX PX`, `GETDEL`,
//! Lua compare-and-set, `INCR` + `PEXPIRE NX`)
//! **Single instance**: in-process map behind one mutex

use crate::error::Result;
use std::time::Duration;

/// Key/value store with TTLs, atomic take, and atomic counters.
pub trait KeyValueStore: Send + Sync {
    /// Read a value without consuming it.
    ///
    /// Returns `None` if the key is absent or expired.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the backend is unreachable.
    fn get(&self, key: &str) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Store a value that expires after `ttl`, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the backend is unreachable.
    fn put_with_ttl(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Store a value only if the key holds no live value.
    ///
    /// # Returns
    ///
    /// `true` if this call stored the value, `false` if another value was
    /// already present (it is left untouched).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the backend is unreachable.
    fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Replace a value only if it still equals `expected`.
    ///
    /// # Returns
    ///
    /// `true` if the value was replaced, `false` if the key is absent or
    /// holds something else.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the backend is unreachable.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Atomically read and delete a value.
    ///
    /// # Returns
    ///
    /// - `Some(value)` for exactly one caller per stored value
    /// - `None` if absent, expired, or already taken
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the backend is unreachable.
    fn take(&self, key: &str) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Atomically increment a counter and return the new value.
    ///
    /// The TTL is applied only when the increment creates the key, so a
    /// window's expiry is fixed by its first request.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the backend is unreachable.
    fn increment_with_ttl(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Delete a value (not found is OK).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the backend is unreachable.
    fn delete(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}
