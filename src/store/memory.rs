//! Embedded in-memory store. Default backend for tests and single-process
//! deployments; anything remote implements [`KvStore`] against its own
//! transport.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KvStore, StoreResult};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |t| t > now)
    }
}

/// BTreeMap-backed store: ordered keys give us prefix scans for free.
/// Expired entries are dropped lazily on read.
pub struct MemoryStore {
    map: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let map = self.map.read().await;
        Ok(map.get(key).filter(|e| e.live(now)).map(|e| e.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|d| Instant::now() + d),
        };
        self.map.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.map.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str, limit: usize) -> StoreResult<Vec<String>> {
        let now = Instant::now();
        let map = self.map.read().await;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .filter(|(_, e)| e.live(now))
            .take(limit)
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn incr(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let mut map = self.map.write().await;
        let current = map
            .get(key)
            .filter(|e| e.live(Instant::now()))
            .and_then(|e| e.value.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + delta;
        map.insert(
            key.to_string(),
            Entry { value: next.to_string(), expires_at: None },
        );
        Ok(next)
    }
}
