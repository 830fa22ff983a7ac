//! Per-session artifact cache
//!
//! One slot per session holding the last computed [`MatrixProfile`]. Writes
//! replace the slot and restart its retention period; reads never extend it.
//! Every store round trip is bounded by the configured operation timeout.

mod codec;
mod factory;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;
mod store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::session::SessionId;
use mps_profile::MatrixProfile;

pub use codec::CodecError;
pub use factory::create_store;
pub use memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use store::{ArtifactStore, StoreError, StoreResult};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("artifact of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("artifact store did not answer within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("artifact encoding failed: {0}")]
    Encode(#[from] CodecError),
}

/// Typed, size-limited view over an [`ArtifactStore`]
#[derive(Clone)]
pub struct ArtifactCache {
    store: Arc<dyn ArtifactStore>,
    retention: Duration,
    max_bytes: usize,
    op_timeout: Duration,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn ArtifactStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            retention: config.retention(),
            max_bytes: config.max_artifact_bytes,
            op_timeout: config.operation_timeout(),
        }
    }

    fn key(session: &SessionId) -> String {
        format!("mps:artifact:{session}")
    }

    async fn bounded<T>(&self, op: impl Future<Output = StoreResult<T>>) -> Result<T, CacheError> {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }

    /// Fetch the session's artifact.
    ///
    /// A payload that no longer decodes is reported as absent.
    pub async fn get(&self, session: &SessionId) -> Result<Option<MatrixProfile>, CacheError> {
        let Some(bytes) = self.bounded(self.store.load(&Self::key(session))).await? else {
            return Ok(None);
        };

        match codec::decode(&bytes) {
            Ok(artifact) => Ok(Some(artifact)),
            Err(e) => {
                warn!(%session, error = %e, "Discarding undecodable cached artifact");
                Ok(None)
            }
        }
    }

    /// Replace the session's artifact and restart its retention period.
    ///
    /// Returns the encoded size. An oversize artifact is rejected before the
    /// store is touched, leaving any previous artifact in place.
    pub async fn put(&self, session: &SessionId, artifact: &MatrixProfile) -> Result<usize, CacheError> {
        let bytes = codec::encode(artifact)?;
        let size = bytes.len();
        if size > self.max_bytes {
            return Err(CacheError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }

        self.bounded(self.store.save(&Self::key(session), bytes, self.retention))
            .await?;
        debug!(%session, size, "Stored artifact");
        Ok(size)
    }

    pub async fn invalidate(&self, session: &SessionId) -> Result<(), CacheError> {
        self.bounded(self.store.remove(&Self::key(session))).await
    }

    pub async fn purge_expired(&self) -> Result<usize, CacheError> {
        self.bounded(self.store.purge_expired()).await
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }
}

/// Periodically reclaim expired entries until the runtime shuts down.
pub fn spawn_purge_task(cache: ArtifactCache, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match cache.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "Purged expired artifacts"),
                Err(e) => warn!(error = %e, "Artifact purge failed"),
            }
        }
    })
}
