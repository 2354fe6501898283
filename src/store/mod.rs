//! Index Store Adapter.
//!
//! Wraps the primitive key-value operations with typed read/write helpers.
//! The backing store is assumed remote and eventually consistent: no
//! multi-key transactions, no optimistic-concurrency tokens. Entity records
//! are authoritative; every secondary index key is a best-effort hint that
//! readers re-validate against the entity where feasible.

pub mod keys;
pub mod memory;
pub mod repair;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use memory::MemoryStore;

/// Faults from the underlying store or the JSON codec on top of it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store operation timed out")]
    Timeout,
    #[error("corrupt record at {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The flat, prefix-scannable key-value primitive the engine consumes.
///
/// `incr` goes beyond the four classic ops: quota and statistics counters
/// are atomically incremented rather than maintained by racy scans.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value, optionally with a retention TTL.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// List up to `limit` keys under `prefix`, ascending lexicographically.
    async fn list_keys(&self, prefix: &str, limit: usize) -> StoreResult<Vec<String>>;

    /// Atomically add `delta` to the counter at `key` and return the new
    /// value. A missing counter reads as zero.
    async fn incr(&self, key: &str, delta: i64) -> StoreResult<i64>;
}

/// Cheap-to-clone handle adding JSON codec helpers over a [`KvStore`].
#[derive(Clone)]
pub struct Store {
    kv: Arc<dyn KvStore>,
}

impl Store {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.kv.get(key).await? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Codec { key: key.to_string(), source }),
        }
    }

    pub async fn put_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> StoreResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|source| StoreError::Codec { key: key.to_string(), source })?;
        self.kv.put(key, &raw, ttl).await
    }

    /// Write a bare index marker ("1"), the convention for every secondary
    /// index and watch-relation key.
    pub async fn put_marker(&self, key: &str) -> StoreResult<()> {
        self.kv.put(key, "1", None).await
    }

    pub async fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        self.kv.get(key).await
    }

    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        self.kv.delete(key).await
    }

    pub async fn list_keys(&self, prefix: &str, limit: usize) -> StoreResult<Vec<String>> {
        self.kv.list_keys(prefix, limit).await
    }

    pub async fn incr(&self, key: &str, delta: i64) -> StoreResult<i64> {
        self.kv.incr(key, delta).await
    }
}
