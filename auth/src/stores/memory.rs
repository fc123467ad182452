//! In-process key/value store.
//!
//! Fast, TTL-scoped storage for single-instance deployments. Every operation
//! runs inside one mutex critical section, so a lookup and the delete that
//! consumes it can never interleave with another caller.
//!
//! # Scaling limitation
//!
//! State lives in this process only. With more than one instance behind a
//! load balancer a challenge issued by instance A cannot be consumed on
//! instance B; use [`crate::stores::RedisStore`] there.
//!
//! # Memory
//!
//! Expired entries are dropped lazily on access and by
//! [`MemoryStore::sweep_expired`]. Call [`MemoryStore::spawn_sweeper`] once at
//! startup to bound memory when abandoned ceremonies pile up.

use crate::config::SweeperConfig;
use crate::error::{AuthError, Result};
use crate::providers::KeyValueStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    Counter(u64),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }

    fn into_bytes(self) -> Vec<u8> {
        match self.value {
            Value::Bytes(bytes) => bytes,
            Value::Counter(n) => n.to_string().into_bytes(),
        }
    }
}

fn expiry(now: Instant, ttl: Duration) -> Result<Instant> {
    now.checked_add(ttl)
        .ok_or_else(|| AuthError::Internal("memory store TTL is out of range".into()))
}

/// In-memory [`KeyValueStore`].
///
/// Cheap to clone; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| AuthError::Internal("memory store mutex poisoned".into()))
    }

    /// Remove every expired entry.
    ///
    /// # Returns
    ///
    /// Number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns error if the store mutex is poisoned.
    pub fn sweep_expired(&self) -> Result<usize> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(before - entries.len())
    }

    /// Number of entries currently held, including not-yet-swept expired ones.
    ///
    /// # Errors
    ///
    /// Returns error if the store mutex is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Returns `true` if the store holds no entries.
    ///
    /// # Errors
    ///
    /// Returns error if the store mutex is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Start a background task that sweeps expired entries every
    /// [`SweeperConfig::effective_interval`].
    ///
    /// Must be called from within a Tokio runtime. Abort the returned handle
    /// to stop sweeping.
    #[must_use]
    pub fn spawn_sweeper(&self, config: SweeperConfig) -> JoinHandle<()> {
        let interval = config.effective_interval();
        if interval != config.interval {
            tracing::warn!(
                requested_ms = config.interval.as_millis(),
                interval_ms = interval.as_millis(),
                "Sweep interval out of range; clamped"
            );
        }

        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.sweep_expired() {
                    Ok(0) => {}
                    Ok(removed) => {
                        tracing::debug!(removed, "Swept expired entries from memory store");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Memory store sweep failed; stopping sweeper");
                        break;
                    }
                }
            }
        })
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.clone().into_bytes())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let expires_at = expiry(Instant::now(), ttl)?;
        self.lock()?.insert(
            key.to_string(),
            Entry {
                value: Value::Bytes(value),
                expires_at,
            },
        );
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Bytes(value),
                expires_at: expiry(now, ttl)?,
            },
        );
        Ok(true)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<bool> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        let matches = entries.get(key).is_some_and(|entry| {
            entry.is_live(now) && matches!(&entry.value, Value::Bytes(current) if current == expected)
        });
        if !matches {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Bytes(value),
                expires_at: expiry(now, ttl)?,
            },
        );
        Ok(true)
    }

    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // Lookup and removal share the critical section.
        let mut entries = self.lock()?;
        let now = Instant::now();
        Ok(entries
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(Entry::into_bytes))
    }

    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => match &mut entry.value {
                Value::Counter(n) => {
                    *n += 1;
                    Ok(*n)
                }
                Value::Bytes(_) => Err(AuthError::Internal(format!(
                    "memory store key {key} does not hold a counter"
                ))),
            },
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Counter(1),
                        expires_at: expiry(now, ttl)?,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_take() {
        let store = MemoryStore::new();
        store
            .put_with_ttl("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.take("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.take("k").await.unwrap(), None);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_values_are_invisible() {
        let store = MemoryStore::new();
        store
            .put_with_ttl("k", b"v".to_vec(), Duration::from_millis(1))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.take("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_take_single_winner() {
        let store = MemoryStore::new();
        store
            .put_with_ttl("once", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let mut handles = vec![];
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.take("once").await.unwrap() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1, "Exactly one take should observe the value");
    }

    #[tokio::test]
    async fn test_counter_increments_and_resets_after_ttl() {
        let store = MemoryStore::new();
        let ttl = Duration::from_millis(20);

        assert_eq!(store.increment_with_ttl("c", ttl).await.unwrap(), 1);
        assert_eq!(store.increment_with_ttl("c", ttl).await.unwrap(), 2);
        assert_eq!(store.get("c").await.unwrap(), Some(b"2".to_vec()));

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.increment_with_ttl("c", ttl).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_increment_rejects_byte_values() {
        let store = MemoryStore::new();
        store
            .put_with_ttl("b", b"x".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.increment_with_ttl("b", Duration::from_secs(60)).await.is_err());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = MemoryStore::new();
        store
            .put_with_ttl("short", vec![1], Duration::from_millis(1))
            .await
            .unwrap();
        store
            .put_with_ttl("long", vec![2], Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(store.sweep_expired().unwrap(), 1);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get("long").await.unwrap(), Some(vec![2]));
    }

    #[tokio::test]
    async fn test_background_sweeper_bounds_memory() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store
                .put_with_ttl(&format!("k{i}"), vec![0], Duration::from_millis(1))
                .await
                .unwrap();
        }

        let sweeper =
            store.spawn_sweeper(SweeperConfig::default().with_interval(Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        sweeper.abort();

        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_zero_interval_sweeper_keeps_running() {
        let store = MemoryStore::new();
        store
            .put_with_ttl("k", vec![0], Duration::from_millis(1))
            .await
            .unwrap();

        let sweeper = store.spawn_sweeper(SweeperConfig::default().with_interval(Duration::ZERO));
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!sweeper.is_finished(), "Sweeper task should still be alive");
        assert!(store.is_empty().unwrap());
        sweeper.abort();
    }

    #[tokio::test]
    async fn test_put_if_absent() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        assert!(store.put_if_absent("k", b"a".to_vec(), ttl).await.unwrap());
        assert!(!store.put_if_absent("k", b"b".to_vec(), ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"a".to_vec()));

        // An expired value counts as absent
        store
            .put_with_ttl("e", b"old".to_vec(), Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.put_if_absent("e", b"new".to_vec(), ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);

        assert!(!store.compare_and_swap("k", b"a", b"b".to_vec(), ttl).await.unwrap());

        store.put_with_ttl("k", b"a".to_vec(), ttl).await.unwrap();
        assert!(!store.compare_and_swap("k", b"x", b"b".to_vec(), ttl).await.unwrap());
        assert!(store.compare_and_swap("k", b"a", b"b".to_vec(), ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn test_concurrent_put_if_absent_single_winner() {
        let store = MemoryStore::new();

        let mut handles = vec![];
        for i in 0..16u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .put_if_absent("slot", vec![i], Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
