//! Signing keyset lifecycle.
//!
//! # Persistence
//!
//! The keyset is stored as JSON in the key/value store under
//! [`KeyManagerConfig::storage_key`], with the private key as an OKP JWK
//! (`d` = base64url Ed25519 seed), so rotation state survives restarts and
//! is shared between instances. A record that cannot be re-imported is
//! logged and replaced with a fresh keyset.
//!
//! # Concurrency
//!
//! Readers clone an `Arc<KeySet>` out of a `tokio::sync::RwLock`; the write
//! lock is held only to swap the `Arc`, never across store I/O. One refresh
//! per instance runs at a time. While it runs, other callers keep using the
//! cached keyset if it is still within its rotation interval.
//!
//! # Multiple instances
//!
//! The stored keyset is the source of truth. A cached keyset is re-checked
//! against the store every [`KeyManagerConfig::effective_refresh_interval`]
//! and replaced when the stored one differs. New keysets are written with
//! `put_if_absent` (first generation) or `compare_and_swap` (replacing the
//! record that was read), so concurrent generators agree on one winner and
//! the losers adopt it.
//!
//! # Grace window
//!
//! After rotation the superseded public key stays in [`KeyManager::jwks`] for
//! [`KeyManagerConfig::grace_period`], so tokens signed just before the
//! rotation still verify.

use super::jwk::{Jwk, JwkSet};
use super::jws;
use crate::config::{KeyManagerConfig, deadline};
use crate::crypto;
use crate::error::{AuthError, Result};
use crate::providers::KeyValueStore;
use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Attempts at writing a new keyset before giving up on a contended store.
const MAX_PUBLISH_ATTEMPTS: usize = 3;

/// Persisted form.
#[derive(Serialize, Deserialize)]
struct StoredKeySet {
    private_key: Jwk,
    previous: Option<Jwk>,
    previous_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Active signing keyset.
#[derive(Clone)]
pub struct KeySet {
    signing_key: SigningKey,

    /// Public key of the signing key.
    pub public_key: Jwk,

    /// Superseded public key still accepted for verification.
    pub previous: Option<Jwk>,

    /// End of the grace window for `previous`.
    pub previous_until: Option<DateTime<Utc>>,

    /// Generation time.
    pub created_at: DateTime<Utc>,

    /// Rotation deadline (`created_at` + rotation interval).
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySet")
            .field("kid", &self.public_key.kid)
            .field("previous", &self.previous.as_ref().map(|k| &k.kid))
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl KeySet {
    /// Key id of the signing key.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.public_key.kid
    }

    /// Returns `true` if the keyset is due for rotation at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    fn previous_in_grace(&self, now: DateTime<Utc>) -> Option<&Jwk> {
        match (&self.previous, self.previous_until) {
            (Some(key), Some(until)) if now < until => Some(key),
            _ => None,
        }
    }

    /// Published keys at `now`: current first, then the previous key while
    /// its grace window lasts.
    #[must_use]
    pub fn published(&self, now: DateTime<Utc>) -> JwkSet {
        let mut keys = vec![self.public_key.clone()];
        keys.extend(self.previous_in_grace(now).cloned());
        JwkSet { keys }
    }

    fn generate(previous: Option<&Self>, config: &KeyManagerConfig) -> Result<Self> {
        let now = Utc::now();
        let previous_until = match previous {
            Some(_) => Some(deadline(now, config.grace_period, "keyset grace period")?),
            None => None,
        };
        let signing_key = SigningKey::from_bytes(&crypto::random_seed());
        Ok(Self {
            public_key: Jwk::from_verifying_key(&signing_key.verifying_key()),
            signing_key,
            previous: previous.map(|p| p.public_key.clone()),
            previous_until,
            created_at: now,
            expires_at: deadline(now, config.rotation_interval, "keyset rotation interval")?,
        })
    }

    fn to_stored(&self) -> StoredKeySet {
        StoredKeySet {
            private_key: Jwk::from_signing_key(&self.signing_key),
            previous: self.previous.clone(),
            previous_until: self.previous_until,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }

    fn from_stored(stored: StoredKeySet) -> Result<Self> {
        let signing_key = stored.private_key.signing_key()?;
        if let Some(previous) = &stored.previous {
            previous.verifying_key()?;
        }
        Ok(Self {
            public_key: stored.private_key.to_public(),
            signing_key,
            previous: stored.previous,
            previous_until: stored.previous_until,
            created_at: stored.created_at,
            expires_at: stored.expires_at,
        })
    }
}

/// Raw stored record and its import, `None` if it could not be re-imported.
struct Persisted {
    bytes: Vec<u8>,
    keyset: Option<KeySet>,
}

/// Cached keyset and when it was last confirmed against the store.
struct Cached {
    keyset: Arc<KeySet>,
    checked_at: DateTime<Utc>,
}

/// Signing key manager.
pub struct KeyManager<K> {
    store: K,
    config: KeyManagerConfig,
    current: RwLock<Option<Cached>>,
    refresh: Mutex<()>,
}

impl<K: KeyValueStore> KeyManager<K> {
    /// Create a key manager. Nothing is loaded until first use.
    #[must_use]
    pub fn new(store: K, config: KeyManagerConfig) -> Self {
        Self {
            store,
            config,
            current: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Option<Persisted>> {
        let Some(bytes) = self.store.get(&self.config.storage_key).await? else {
            return Ok(None);
        };

        let imported = serde_json::from_slice::<StoredKeySet>(&bytes)
            .map_err(AuthError::from)
            .and_then(KeySet::from_stored);

        let keyset = match imported {
            Ok(keyset) => Some(keyset),
            Err(e) => {
                tracing::warn!(error = %e, "Persisted keyset could not be re-imported; regenerating");
                None
            }
        };
        Ok(Some(Persisted { bytes, keyset }))
    }

    /// Write `keyset` over `replacing` (the record that was read, if any).
    ///
    /// Returns `false` if the stored record changed in between.
    async fn publish(&self, replacing: Option<&[u8]>, keyset: &KeySet) -> Result<bool> {
        // Keep the record until the grace window of its successor could end.
        let until = deadline(keyset.expires_at, self.config.grace_period, "keyset lifetime")?;
        let ttl = (until - Utc::now())
            .to_std()
            .map_err(|_| AuthError::Internal("keyset lifetime must be positive".into()))?;
        let bytes = serde_json::to_vec(&keyset.to_stored())?;
        let key = &self.config.storage_key;

        match replacing {
            None => self.store.put_if_absent(key, bytes, ttl).await,
            Some(current) => self.store.compare_and_swap(key, current, bytes, ttl).await,
        }
    }

    async fn cached(&self) -> Option<(Arc<KeySet>, DateTime<Utc>)> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|c| (Arc::clone(&c.keyset), c.checked_at))
    }

    async fn cached_keyset(&self) -> Option<Arc<KeySet>> {
        self.cached().await.map(|(keyset, _)| keyset)
    }

    fn is_fresh(&self, keyset: &KeySet, checked_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        !keyset.is_expired(now) && now - checked_at < self.config.effective_refresh_interval()
    }

    async fn adopt(&self, keyset: Arc<KeySet>, checked_at: DateTime<Utc>) -> Arc<KeySet> {
        let mut slot = self.current.write().await;
        if slot.as_ref().map(|c| c.keyset.kid()) != Some(keyset.kid()) {
            tracing::debug!(kid = %keyset.kid(), "Adopted signing keyset");
        }
        *slot = Some(Cached {
            keyset: Arc::clone(&keyset),
            checked_at,
        });
        keyset
    }

    /// Generate a successor of the stored keyset and try to publish it.
    ///
    /// Returns `None` if another writer replaced the record first.
    async fn replace(&self, persisted: Option<Persisted>) -> Result<Option<Arc<KeySet>>> {
        let (replacing, stored) = match persisted {
            Some(Persisted { bytes, keyset }) => (Some(bytes), keyset.map(Arc::new)),
            None => (None, None),
        };
        let previous = match stored {
            Some(keyset) => Some(keyset),
            None => self.cached_keyset().await,
        };

        let keyset = KeySet::generate(previous.as_deref(), &self.config)?;
        if !self.publish(replacing.as_deref(), &keyset).await? {
            tracing::debug!("Keyset replaced concurrently; re-reading");
            return Ok(None);
        }

        tracing::info!(
            kid = %keyset.kid(),
            previous_kid = ?previous.as_ref().map(|p| p.kid()),
            expires_at = %keyset.expires_at,
            "Published signing keyset"
        );
        Ok(Some(Arc::new(keyset)))
    }

    /// Bring the cache in line with the store, generating a keyset if the
    /// stored one is missing, unreadable, or due for rotation.
    async fn sync(&self) -> Result<Arc<KeySet>> {
        for _ in 0..MAX_PUBLISH_ATTEMPTS {
            let now = Utc::now();
            let persisted = self.load().await?;

            if let Some(keyset) = persisted
                .as_ref()
                .and_then(|p| p.keyset.as_ref())
                .filter(|k| !k.is_expired(now))
            {
                return Ok(self.adopt(Arc::new(keyset.clone()), now).await);
            }

            if let Some(keyset) = self.replace(persisted).await? {
                return Ok(self.adopt(keyset, now).await);
            }
        }
        Err(AuthError::Internal(
            "signing keyset kept changing during refresh".into(),
        ))
    }

    /// Current keyset, loading or generating it if absent or past rotation.
    ///
    /// The cached keyset is re-checked against the store at most every
    /// [`KeyManagerConfig::effective_refresh_interval`]. If the store is
    /// unreachable but the cached keyset is within its rotation interval, the
    /// cached keyset is served.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the store is unreachable
    /// and no usable keyset is cached.
    pub async fn current(&self) -> Result<Arc<KeySet>> {
        let now = Utc::now();
        let cached = self.cached().await;
        if let Some((keyset, checked_at)) = &cached {
            if self.is_fresh(keyset, *checked_at, now) {
                return Ok(Arc::clone(keyset));
            }
        }
        let usable = cached
            .map(|(keyset, _)| keyset)
            .filter(|k| !k.is_expired(now));

        let _refreshing = match self.refresh.try_lock() {
            Ok(guard) => guard,
            Err(_) => match &usable {
                Some(keyset) => return Ok(Arc::clone(keyset)),
                None => self.refresh.lock().await,
            },
        };

        // Another task may have refreshed while we waited for the lock.
        if let Some((keyset, checked_at)) = self.cached().await {
            if self.is_fresh(&keyset, checked_at, Utc::now()) {
                return Ok(keyset);
            }
        }

        match self.sync().await {
            Ok(keyset) => Ok(keyset),
            Err(e) => match usable {
                Some(keyset) => {
                    tracing::warn!(error = %e, kid = %keyset.kid(), "Keyset refresh failed; serving cached keyset");
                    Ok(keyset)
                }
                None => Err(e),
            },
        }
    }

    /// Force a new keyset, superseding the stored one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the store is unreachable;
    /// the previous keyset stays current in that case.
    pub async fn rotate(&self) -> Result<Arc<KeySet>> {
        let _refreshing = self.refresh.lock().await;

        for _ in 0..MAX_PUBLISH_ATTEMPTS {
            let now = Utc::now();
            let persisted = self.load().await?;
            if let Some(keyset) = self.replace(persisted).await? {
                tracing::info!(kid = %keyset.kid(), "Rotated signing keyset");
                return Ok(self.adopt(keyset, now).await);
            }
        }
        Err(AuthError::Internal(
            "signing keyset kept changing during rotation".into(),
        ))
    }

    /// Published public keys (`{"keys": [...]}`).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if the store is unreachable.
    pub async fn jwks(&self) -> Result<JwkSet> {
        Ok(self.current().await?.published(Utc::now()))
    }

    /// Sign claims with the current key.
    ///
    /// # Errors
    ///
    /// Returns error if the keyset is unavailable or the claims cannot be encoded.
    pub async fn sign<C: Serialize + Sync>(&self, claims: &C) -> Result<String> {
        let keyset = self.current().await?;
        jws::sign(&keyset.signing_key, keyset.kid(), claims)
    }

    /// Verify a token against the published keys and decode its claims.
    ///
    /// An unknown `kid` triggers one reload from the store, so a rotation
    /// performed by another instance is picked up before the next refresh.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for unknown keys, bad signatures,
    /// or expired tokens.
    pub async fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C> {
        let kid = jws::decode_header(token)?.kid;

        let mut published = self.jwks().await?;
        if published.find(&kid).is_none() {
            self.reload().await?;
            published = self.jwks().await?;
        }

        let key = published
            .find(&kid)
            .ok_or_else(|| AuthError::InvalidToken("unknown signing key".into()))?
            .verifying_key()?;

        jws::verify(token, &key)
    }

    /// Replace the cached keyset with the stored one if it differs.
    async fn reload(&self) -> Result<()> {
        let now = Utc::now();
        let Some(loaded) = self.load().await?.and_then(|p| p.keyset) else {
            return Ok(());
        };
        if loaded.is_expired(now) {
            return Ok(());
        }

        if self.cached_keyset().await.as_ref().map(|k| k.kid()) != Some(loaded.kid()) {
            tracing::info!(kid = %loaded.kid(), "Picked up signing keyset rotated elsewhere");
            self.adopt(Arc::new(loaded), now).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn manager(store: MemoryStore) -> KeyManager<MemoryStore> {
        KeyManager::new(store, KeyManagerConfig::default())
    }

    fn claims() -> serde_json::Value {
        json!({"sub": "u1", "exp": Utc::now().timestamp() + 300})
    }

    /// Memory store whose every call waits `delay_ms` first.
    #[derive(Clone, Default)]
    struct SlowStore {
        inner: MemoryStore,
        delay_ms: Arc<AtomicU64>,
    }

    impl SlowStore {
        async fn pause(&self) {
            let ms = self.delay_ms.load(Ordering::SeqCst);
            if ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
            }
        }
    }

    impl KeyValueStore for SlowStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.pause().await;
            self.inner.get(key).await
        }

        async fn put_with_ttl(&self, key: &str, value: Vec<u8>, ttl: std::time::Duration) -> Result<()> {
            self.pause().await;
            self.inner.put_with_ttl(key, value, ttl).await
        }

        async fn put_if_absent(&self, key: &str, value: Vec<u8>, ttl: std::time::Duration) -> Result<bool> {
            self.pause().await;
            self.inner.put_if_absent(key, value, ttl).await
        }

        async fn compare_and_swap(
            &self,
            key: &str,
            expected: &[u8],
            value: Vec<u8>,
            ttl: std::time::Duration,
        ) -> Result<bool> {
            self.pause().await;
            self.inner.compare_and_swap(key, expected, value, ttl).await
        }

        async fn take(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.pause().await;
            self.inner.take(key).await
        }

        async fn increment_with_ttl(&self, key: &str, ttl: std::time::Duration) -> Result<u64> {
            self.pause().await;
            self.inner.increment_with_ttl(key, ttl).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.pause().await;
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn test_fresh_keyset_expires_in_rotation_interval() {
        let keys = manager(MemoryStore::new());
        let keyset = keys.current().await.unwrap();

        let lifetime = keyset.expires_at - keyset.created_at;
        assert_eq!(lifetime, Duration::days(30));
        assert!(keyset.previous.is_none());

        let again = keys.current().await.unwrap();
        assert_eq!(again.kid(), keyset.kid());
    }

    #[tokio::test]
    async fn test_keyset_survives_restart() {
        let store = MemoryStore::new();
        let kid = manager(store.clone()).current().await.unwrap().kid().to_string();

        let restarted = manager(store);
        assert_eq!(restarted.current().await.unwrap().kid(), kid);
    }

    #[tokio::test]
    async fn test_corrupt_keyset_regenerated() {
        let store = MemoryStore::new();
        store
            .put_with_ttl(
                crate::constants::keys::KEYSET,
                b"{not json".to_vec(),
                std::time::Duration::from_secs(60),
            )
            .await
            .unwrap();

        let keyset = manager(store.clone()).current().await.unwrap();
        assert_eq!(keyset.kid().len(), 43);

        let persisted = store.get(crate::constants::keys::KEYSET).await.unwrap().unwrap();
        assert!(serde_json::from_slice::<serde_json::Value>(&persisted).is_ok());
    }

    #[tokio::test]
    async fn test_rotation_publishes_previous_key() {
        let keys = manager(MemoryStore::new());
        let old = keys.current().await.unwrap();
        let token = keys.sign(&claims()).await.unwrap();

        let new = keys.rotate().await.unwrap();
        assert_ne!(new.kid(), old.kid());

        let jwks = keys.jwks().await.unwrap();
        assert_eq!(jwks.keys.len(), 2);
        assert_eq!(jwks.keys[0].kid, new.kid());
        assert_eq!(jwks.keys[1].kid, old.kid());
        assert!(jwks.keys.iter().all(|k| k.d.is_none()));

        let verified: serde_json::Value = keys.verify(&token).await.unwrap();
        assert_eq!(verified["sub"], "u1");
    }

    #[tokio::test]
    async fn test_previous_key_dropped_after_grace() {
        let config = KeyManagerConfig::default().with_grace_period(Duration::milliseconds(10));
        let keys = KeyManager::new(MemoryStore::new(), config);
        keys.current().await.unwrap();
        let token = keys.sign(&claims()).await.unwrap();
        keys.rotate().await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        assert_eq!(keys.jwks().await.unwrap().keys.len(), 1);
        let result: Result<serde_json::Value> = keys.verify(&token).await;
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_rotation_elsewhere_is_picked_up() {
        let store = MemoryStore::new();
        let a = manager(store.clone());
        let b = manager(store);

        a.current().await.unwrap();
        b.current().await.unwrap();
        b.rotate().await.unwrap();

        let token = b.sign(&claims()).await.unwrap();
        let verified: serde_json::Value = a.verify(&token).await.unwrap();
        assert_eq!(verified["sub"], "u1");
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_one_keyset() {
        let keys = Arc::new(manager(MemoryStore::new()));

        let mut handles = vec![];
        for _ in 0..10 {
            let keys = Arc::clone(&keys);
            handles.push(tokio::spawn(async move {
                keys.current().await.unwrap().kid().to_string()
            }));
        }

        let mut kids = vec![];
        for handle in handles {
            kids.push(handle.await.unwrap());
        }
        kids.dedup();
        assert_eq!(kids.len(), 1, "All readers should observe the same keyset");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_instances_starting_together_share_one_keyset() {
        let store = MemoryStore::new();

        let mut handles = vec![];
        for _ in 0..8 {
            let keys = manager(store.clone());
            handles.push(tokio::spawn(async move {
                keys.current().await.unwrap().kid().to_string()
            }));
        }

        let mut kids = vec![];
        for handle in handles {
            kids.push(handle.await.unwrap());
        }
        kids.dedup();
        assert_eq!(kids.len(), 1, "Only one generated keyset may win");

        // The winner is the one persisted
        let restarted = manager(store).current().await.unwrap();
        assert_eq!(restarted.kid(), kids[0]);
    }

    #[tokio::test]
    async fn test_slow_store_does_not_block_signing() {
        let store = SlowStore::default();
        let config = KeyManagerConfig::default().with_refresh_interval(Duration::milliseconds(1));
        let keys = Arc::new(KeyManager::new(store.clone(), config));
        let old = keys.current().await.unwrap();

        store.delay_ms.store(200, Ordering::SeqCst);
        let rotating = {
            let keys = Arc::clone(&keys);
            tokio::spawn(async move { keys.rotate().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Rotation is waiting on the store; the cached keyset keeps signing.
        let signed = tokio::time::timeout(std::time::Duration::from_millis(100), keys.sign(&claims())).await;
        assert!(matches!(signed, Ok(Ok(_))), "Signing should not wait on store I/O");

        let new = rotating.await.unwrap().unwrap();
        assert_ne!(new.kid(), old.kid());
    }

    #[tokio::test]
    async fn test_unrepresentable_rotation_interval_rejected() {
        let config = KeyManagerConfig::default().with_rotation_interval(Duration::MAX);
        let keys = KeyManager::new(MemoryStore::new(), config);

        assert!(matches!(keys.current().await, Err(AuthError::Internal(_))));
    }
}
