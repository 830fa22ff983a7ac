//! Store construction from configuration

use std::sync::Arc;

use super::memory::InMemoryStore;
use super::store::{ArtifactStore, StoreError, StoreResult};
use crate::clock::Clock;
use crate::config::StoreConfig;

/// Build the configured backing store.
pub async fn create_store(
    config: &StoreConfig,
    clock: Arc<dyn Clock>,
) -> StoreResult<Arc<dyn ArtifactStore>> {
    match config {
        StoreConfig::InMemory => Ok(Arc::new(InMemoryStore::with_clock(clock))),
        #[cfg(feature = "redis")]
        StoreConfig::Redis { url } => {
            let store = super::redis_store::RedisStore::connect(url).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        StoreConfig::Redis { url } => Err(StoreError::Unavailable(format!(
            "redis store at {url} requested but this build lacks the `redis` feature"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[tokio::test]
    async fn test_creates_in_memory_store() {
        let store = create_store(&StoreConfig::InMemory, Arc::new(SystemClock))
            .await
            .unwrap();
        assert_eq!(store.backend(), "in_memory");
    }

    #[cfg(not(feature = "redis"))]
    #[tokio::test]
    async fn test_redis_requires_feature() {
        let config = StoreConfig::Redis {
            url: "redis://localhost".to_string(),
        };
        let result = create_store(&config, Arc::new(SystemClock)).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
