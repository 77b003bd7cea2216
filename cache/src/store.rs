//! Redis-backed key-value store with soft-fail semantics.

use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};

/// Key-value cache over a Redis backend.
///
/// A store without a backend (connection refused at startup, or
/// [`CacheStore::disabled`]) answers every `get` with a miss and
/// swallows every write. Backend errors at call time degrade the same
/// way; callers never see a cache failure.
#[derive(Clone)]
pub struct CacheStore {
    conn: Option<ConnectionManager>,
}

impl CacheStore {
    /// Connect to the cache backend, verifying it with a ping.
    ///
    /// Connection failure yields a disabled store, not an error.
    pub async fn connect(url: &str) -> Self {
        match Self::try_connect(url).await {
            Ok(conn) => {
                info!("cache store connected");
                Self { conn: Some(conn) }
            }
            Err(err) => {
                warn!("cache backend unavailable, caching disabled: {err}");
                Self { conn: None }
            }
        }
    }

    async fn try_connect(url: &str) -> redis::RedisResult<ConnectionManager> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;

        let mut conn = manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(manager)
    }

    /// A store with no backend; every read misses, every write is a
    /// no-op.
    pub fn disabled() -> Self {
        Self { conn: None }
    }

    /// Whether a backend is attached.
    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    /// Fetch a value, treating any backend condition as a miss.
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone()?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(value)) => {
                debug!("cache hit for key: {key}");
                Some(value)
            }
            Ok(None) => None,
            Err(err) => {
                warn!("cache retrieval error for {key}: {err}");
                None
            }
        }
    }

    /// Store a value with a bounded lifetime.
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        if let Err(err) = conn
            .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
        {
            warn!("cache storage error for {key}: {err}");
        } else {
            debug!("cached result for key: {key}");
        }
    }

    /// Store a value with no expiry.
    pub async fn set_permanent(&self, key: &str, value: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        if let Err(err) = conn.set::<_, _, ()>(key, value).await {
            warn!("cache storage error for {key}: {err}");
        } else {
            debug!("cached result for key: {key}");
        }
    }

    /// List keys matching a glob pattern; empty when the backend is
    /// absent or unhappy.
    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        let Some(mut conn) = self.conn.clone() else {
            return Vec::new();
        };
        match conn.keys::<_, Vec<String>>(pattern).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!("cache key scan error for {pattern}: {err}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_store_misses_and_swallows_writes() {
        let store = CacheStore::disabled();
        assert!(!store.is_enabled());

        store.set_with_ttl("k", "v", Duration::from_secs(60)).await;
        store.set_permanent("k", "v").await;

        assert_eq!(store.get("k").await, None);
        assert!(store.keys("*").await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_backend_degrades_to_disabled() {
        // Nothing listens on this port; connect must not error out.
        let store = CacheStore::connect("redis://127.0.0.1:1/").await;
        assert!(!store.is_enabled());
        assert_eq!(store.get("k").await, None);
    }
}
