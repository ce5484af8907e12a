//! Backing store for persisted conversation memory.
//!
//! `ListStore` captures the primitive operations the persisted memory
//! consumes: string get/set/delete with optional expiry, an ordered string
//! list, and an existence check. `RedisStore` implements it over a Redis
//! connection manager. Any backend failure surfaces as a single
//! `StorageError::Unavailable` condition — callers never see the underlying
//! error taxonomy.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Result type for backing-store operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur talking to the backing store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

/// Primitive key-value and ordered-list operations.
///
/// Implementations must be safe for concurrent use by independent
/// conversations; operations on the *same* key are not transactional.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Set a string value, with optional expiry in seconds.
    async fn set(&self, key: &str, value: &str, expiry_secs: Option<u64>) -> Result<()>;

    /// Get a string value, `None` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete a key (list or string). Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check whether a key exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Append a value to the end of the list at `key`, creating it if
    /// missing. Returns the list length after the push.
    async fn rpush(&self, key: &str, value: &str) -> Result<usize>;

    /// Read the whole list at `key` in order. Missing key yields an empty
    /// list.
    async fn lrange_all(&self, key: &str) -> Result<Vec<String>>;

    /// Length of the list at `key` (0 when missing).
    async fn llen(&self, key: &str) -> Result<usize>;
}

/// Redis-backed implementation of `ListStore`.
///
/// Holds a multiplexed connection manager, so clones share one connection
/// and the store is cheap to pass around.
#[derive(Clone)]
pub struct RedisStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. `redis://:password@host:port/0`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl ListStore for RedisStore {
    async fn set(&self, key: &str, value: &str, expiry_secs: Option<u64>) -> Result<()> {
        let mut conn = self.manager.clone();
        match expiry_secs {
            Some(secs) => {
                let _: () = conn.set_ex(key, value, secs).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let removed: usize = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<usize> {
        let mut conn = self.manager.clone();
        let len: usize = conn.rpush(key, value).await?;
        Ok(len)
    }

    async fn lrange_all(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let values: Vec<String> = conn.lrange(key, 0, -1).await?;
        Ok(values)
    }

    async fn llen(&self, key: &str) -> Result<usize> {
        let mut conn = self.manager.clone();
        let len: usize = conn.llen(key).await?;
        Ok(len)
    }
}

#[derive(Default)]
struct MemoryStoreInner {
    strings: HashMap<String, String>,
    lists: HashMap<String, Vec<String>>,
    expiries: HashMap<String, Instant>,
}

impl MemoryStoreInner {
    fn evict_if_expired(&mut self, key: &str) {
        if self.expiries.get(key).is_some_and(|t| *t <= Instant::now()) {
            self.strings.remove(key);
            self.lists.remove(key);
            self.expiries.remove(key);
        }
    }
}

/// In-process `ListStore` backed by hash maps.
///
/// Simulates the Redis adapter's observable behavior for tests and
/// Redis-free development runs. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStoreInner> {
        // A poisoned lock means a panicking test thread; propagating the
        // panic is the right outcome there.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ListStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, expiry_secs: Option<u64>) -> Result<()> {
        let mut inner = self.lock();
        inner.evict_if_expired(key);
        inner.strings.insert(key.to_string(), value.to_string());
        match expiry_secs {
            Some(secs) => {
                inner
                    .expiries
                    .insert(key.to_string(), Instant::now() + Duration::from_secs(secs));
            }
            None => {
                inner.expiries.remove(key);
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.lock();
        inner.evict_if_expired(key);
        Ok(inner.strings.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.lock();
        inner.evict_if_expired(key);
        let s = inner.strings.remove(key).is_some();
        let l = inner.lists.remove(key).is_some();
        inner.expiries.remove(key);
        Ok(s || l)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut inner = self.lock();
        inner.evict_if_expired(key);
        Ok(inner.strings.contains_key(key) || inner.lists.contains_key(key))
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<usize> {
        let mut inner = self.lock();
        inner.evict_if_expired(key);
        let list = inner.lists.entry(key.to_string()).or_default();
        list.push(value.to_string());
        Ok(list.len())
    }

    async fn lrange_all(&self, key: &str) -> Result<Vec<String>> {
        let mut inner = self.lock();
        inner.evict_if_expired(key);
        Ok(inner.lists.get(key).cloned().unwrap_or_default())
    }

    async fn llen(&self, key: &str) -> Result<usize> {
        let mut inner = self.lock();
        inner.evict_if_expired(key);
        Ok(inner.lists.get(key).map_or(0, Vec::len))
    }
}
