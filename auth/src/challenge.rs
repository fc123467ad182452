//! Single-use `WebAuthn` ceremony challenges.
//!
//! # Lifecycle
//!
//! 1. [`ChallengeStore::issue`] stores a fresh challenge under a random id with
//!    a fixed TTL (5 minutes by default).
//! 2. The client completes the ceremony and echoes the id back.
//! 3. [`ChallengeStore::consume`] atomically takes the record out of the
//!    store, then checks expiry and kind. The record is gone whatever the
//!    outcome, so a challenge is usable at most once.
//!
//! Abandoned challenges expire with the store TTL; the memory backend also
//! sweeps them in the background.

use crate::config::deadline;
use crate::constants::{entropy, keys};
use crate::crypto;
use crate::error::{AuthError, Result};
use crate::providers::KeyValueStore;
use crate::state::UserId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Ceremony a challenge was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    /// `navigator.credentials.create()`.
    Registration,
    /// `navigator.credentials.get()`.
    Authentication,
}

impl ChallengeKind {
    /// Kind name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Authentication => "authentication",
        }
    }
}

/// Issued ceremony challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Lookup id returned to the client alongside the options.
    pub id: String,

    /// Challenge value (base64url of 32 random bytes).
    pub value: String,

    /// User the ceremony was started for. `None` for discoverable-credential
    /// sign-in where the user is not known up front.
    pub bound_user_id: Option<UserId>,

    /// Ceremony kind.
    pub kind: ChallengeKind,

    /// Issue time.
    pub created_at: DateTime<Utc>,

    /// Hard expiry, enforced on consumption.
    pub expires_at: DateTime<Utc>,
}

impl Challenge {
    /// Returns `true` if the challenge is past its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Challenge store over a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct ChallengeStore<K> {
    store: K,
    ttl: Duration,
}

impl<K: KeyValueStore> ChallengeStore<K> {
    /// Create a challenge store.
    ///
    /// # Arguments
    ///
    /// * `store` - Backing key/value store
    /// * `ttl` - Challenge lifetime
    #[must_use]
    pub const fn new(store: K, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Challenge lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(id: &str) -> String {
        format!("{}{id}", keys::CHALLENGE_PREFIX)
    }

    /// Issue and store a fresh challenge.
    ///
    /// # Errors
    ///
    /// Returns error if the TTL is not positive or the store is unreachable.
    pub async fn issue(&self, kind: ChallengeKind, bound_user_id: Option<UserId>) -> Result<Challenge> {
        let ttl = self
            .ttl
            .to_std()
            .ok()
            .filter(|ttl| !ttl.is_zero())
            .ok_or_else(|| AuthError::Internal("challenge TTL must be positive".into()))?;

        let now = Utc::now();
        let challenge = Challenge {
            id: crypto::random_id(),
            value: crypto::random_token(entropy::CHALLENGE_BYTES),
            bound_user_id,
            kind,
            created_at: now,
            expires_at: deadline(now, self.ttl, "challenge TTL")?,
        };

        let bytes = bincode::serialize(&challenge)?;
        self.store
            .put_with_ttl(&Self::key(&challenge.id), bytes, ttl)
            .await?;

        tracing::info!(
            challenge_id = %challenge.id,
            kind = challenge.kind.as_str(),
            bound = challenge.bound_user_id.is_some(),
            "Issued WebAuthn challenge"
        );

        Ok(challenge)
    }

    /// Atomically take a challenge out of the store and validate it.
    ///
    /// # Errors
    ///
    /// - `AuthError::ChallengeNotFound` if absent or already consumed
    /// - `AuthError::ChallengeExpired` if past its expiry
    /// - `AuthError::ChallengeKindMismatch` if issued for the other ceremony
    pub async fn consume(&self, id: &str, kind: ChallengeKind) -> Result<Challenge> {
        let Some(bytes) = self.store.take(&Self::key(id)).await? else {
            tracing::warn!(challenge_id = %id, "Challenge not found or already consumed");
            return Err(AuthError::ChallengeNotFound);
        };

        let challenge: Challenge = bincode::deserialize(&bytes)?;

        if challenge.is_expired(Utc::now()) {
            tracing::info!(challenge_id = %id, "Challenge expired");
            return Err(AuthError::ChallengeExpired);
        }

        if challenge.kind != kind {
            tracing::warn!(
                challenge_id = %id,
                expected = kind.as_str(),
                actual = challenge.kind.as_str(),
                security_event = true,
                "Challenge presented for the wrong ceremony"
            );
            return Err(AuthError::ChallengeKindMismatch);
        }

        tracing::debug!(challenge_id = %id, "Consumed WebAuthn challenge");
        Ok(challenge)
    }
}
