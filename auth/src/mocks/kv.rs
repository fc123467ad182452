//! Key/value store that is always down.

use crate::error::{AuthError, Result};
use crate::providers::KeyValueStore;
use std::time::Duration;

/// Key/value store whose every call fails with `UpstreamUnavailable`.
///
/// Exercises fail-open (rate limiter) and fail-closed (challenges, codes)
/// behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingKvStore;

impl FailingKvStore {
    /// Create a failing store.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn down() -> AuthError {
    AuthError::UpstreamUnavailable("mock store offline".into())
}

impl KeyValueStore for FailingKvStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(down())
    }

    async fn put_with_ttl(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        Err(down())
    }

    async fn put_if_absent(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<bool> {
        Err(down())
    }

    async fn compare_and_swap(
        &self,
        _key: &str,
        _expected: &[u8],
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> Result<bool> {
        Err(down())
    }

    async fn take(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(down())
    }

    async fn increment_with_ttl(&self, _key: &str, _ttl: Duration) -> Result<u64> {
        Err(down())
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(down())
    }
}
