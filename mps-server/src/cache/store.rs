//! Backing store abstraction
//!
//! Stores deal in opaque bytes with a per-write TTL. Typing and size policy
//! live one level up in [`ArtifactCache`](super::ArtifactCache).

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key/value store with expiring entries
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// `Ok(None)` means the key is definitely absent or expired.
    async fn load(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replace the value at `key`; it expires `ttl` after this write.
    async fn save(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()>;

    /// Idempotent on an absent key.
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Drop expired entries. Stores that expire natively report zero.
    async fn purge_expired(&self) -> StoreResult<usize> {
        Ok(0)
    }

    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;
}
