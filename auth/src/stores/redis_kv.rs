//! Redis-based key/value store implementation.
//!
//! Shared state for multi-instance deployments.
//!
//! # Commands
//!
//! - **put**: `SET key value PX ttl_ms`
//! - **put if absent**: `SET key value NX PX ttl_ms`
//! - **compare and swap**: Lua script `GET` + `SET PX` when the value matches
//! - **take**: `GETDEL key` (atomic get + delete, single-use guarantee)
//! - **increment**: Lua script `INCR` + `PEXPIRE` when the counter is new,
//!   executed atomically by the server
//!
//! # Example
//!
//! ```no_run
//! use passgate_auth::stores::RedisStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisStore::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::providers::KeyValueStore;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::sync::LazyLock;
use std::time::Duration;

/// Increment and set the expiry only when the key was just created, so the
/// window is anchored to its first request.
static INCREMENT_WITH_TTL: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local n = redis.call('INCR', KEYS[1])
if n == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return n
",
    )
});

/// Replace the value only if it still equals the expected bytes.
static COMPARE_AND_SWAP: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
    return 1
end
return 0
",
    )
});

/// `Redis`-based [`KeyValueStore`].
///
/// Provides:
/// - Atomic single-use reads (`GETDEL`)
/// - Automatic expiration via TTL
/// - Atomic counters with window TTL
/// - Connection pooling via `ConnectionManager`
#[derive(Clone)]
pub struct RedisStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisStore {
    /// Create a new `Redis` store.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    ///
    /// # Errors
    ///
    /// Returns error if connection to `Redis` fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            AuthError::Internal(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            AuthError::UpstreamUnavailable(format!(
                "Failed to create Redis connection manager: {e}"
            ))
        })?;

        Ok(Self { conn_manager })
    }

    #[allow(clippy::cast_possible_truncation)] // TTLs are minutes to days
    fn ttl_millis(ttl: Duration) -> u64 {
        (ttl.as_millis() as u64).max(1)
    }
}

impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn put_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn.pset_ex(key, value, Self::ttl_millis(ttl)).await?;
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        // Reply is `OK` when set, nil when the key already exists.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(Self::ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &[u8],
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let swapped: i64 = COMPARE_AND_SWAP
            .key(key)
            .arg(expected)
            .arg(value)
            .arg(Self::ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(swapped == 1)
    }

    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn_manager.clone();

        // GETDEL is atomic: get + delete in one operation
        let value: Option<Vec<u8>> = conn.get_del(key).await?;
        Ok(value)
    }

    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64> {
        let mut conn = self.conn_manager.clone();
        let count: u64 = INCREMENT_WITH_TTL
            .key(key)
            .arg(Self::ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_redis_take_is_single_use() {
        let store = RedisStore::new("redis://127.0.0.1:6379").await.unwrap();
        let key = format!("test:take:{}", uuid::Uuid::new_v4());

        store
            .put_with_ttl(&key, b"value".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.take(&key).await.unwrap(), Some(b"value".to_vec()));
        assert_eq!(store.take(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_redis_concurrent_take() {
        let store = RedisStore::new("redis://127.0.0.1:6379").await.unwrap();
        let key = format!("test:race:{}", uuid::Uuid::new_v4());

        store
            .put_with_ttl(&key, b"value".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let mut handles = vec![];
        for _ in 0..10 {
            let store = store.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move { store.take(&key).await.unwrap() }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1, "GETDEL must hand the value to exactly one caller");
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_redis_conditional_writes() {
        let store = RedisStore::new("redis://127.0.0.1:6379").await.unwrap();
        let key = format!("test:cas:{}", uuid::Uuid::new_v4());
        let ttl = Duration::from_secs(60);

        assert!(store.put_if_absent(&key, b"a".to_vec(), ttl).await.unwrap());
        assert!(!store.put_if_absent(&key, b"b".to_vec(), ttl).await.unwrap());

        assert!(!store.compare_and_swap(&key, b"x", b"c".to_vec(), ttl).await.unwrap());
        assert!(store.compare_and_swap(&key, b"a", b"c".to_vec(), ttl).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), Some(b"c".to_vec()));

        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn test_redis_counter_window() {
        let store = RedisStore::new("redis://127.0.0.1:6379").await.unwrap();
        let key = format!("test:counter:{}", uuid::Uuid::new_v4());
        let ttl = Duration::from_secs(1);

        assert_eq!(store.increment_with_ttl(&key, ttl).await.unwrap(), 1);
        assert_eq!(store.increment_with_ttl(&key, ttl).await.unwrap(), 2);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.increment_with_ttl(&key, ttl).await.unwrap(), 1);
        store.delete(&key).await.unwrap();
    }
}
