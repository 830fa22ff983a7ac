//! Process-local artifact store

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{ArtifactStore, StoreResult};
use crate::clock::{Clock, SystemClock};

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: SystemTime,
}

/// In-memory store with per-entry expiry.
///
/// Expired entries are invisible to `load` immediately and are reclaimed by
/// [`purge_expired`](ArtifactStore::purge_expired).
#[derive(Debug)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of entries held, expired or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    async fn load(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone()))
    }

    async fn save(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        let expires_at = self.clock.now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> StoreResult<usize> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }

    fn backend(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn store() -> (InMemoryStore, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new());
        (InMemoryStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (store, _) = store();
        store.save("a", vec![1, 2, 3], Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.load("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let (store, clock) = store();
        store.save("a", vec![1], Duration::from_secs(10)).await.unwrap();

        clock.advance(Duration::from_secs(9));
        assert!(store.load("a").await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(store.load("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reads_do_not_extend_ttl() {
        let (store, clock) = store();
        store.save("a", vec![1], Duration::from_secs(10)).await.unwrap();
        for _ in 0..5 {
            clock.advance(Duration::from_secs(3));
            let _ = store.load("a").await.unwrap();
        }
        assert!(store.load("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rewrite_resets_ttl() {
        let (store, clock) = store();
        store.save("a", vec![1], Duration::from_secs(10)).await.unwrap();
        clock.advance(Duration::from_secs(8));
        store.save("a", vec![2], Duration::from_secs(10)).await.unwrap();
        clock.advance(Duration::from_secs(8));
        assert_eq!(store.load("a").await.unwrap(), Some(vec![2]));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (store, _) = store();
        store.save("a", vec![1], Duration::from_secs(10)).await.unwrap();
        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert!(store.load("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_drops_only_expired() {
        let (store, clock) = store();
        store.save("short", vec![1], Duration::from_secs(5)).await.unwrap();
        store.save("long", vec![2], Duration::from_secs(50)).await.unwrap();

        clock.advance(Duration::from_secs(10));
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
        assert!(store.load("long").await.unwrap().is_some());
    }
}
