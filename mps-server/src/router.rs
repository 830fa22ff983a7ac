//! Query routing over the per-session artifact
//!
//! `compute` builds a session's matrix profile and caches it; every other
//! query reads that artifact back. Engine work runs on the blocking pool and
//! shares a single per-request deadline with cache reads. A cache write only
//! starts before that deadline and is then awaited to completion.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{ArtifactCache, CacheError};
use crate::error::{ApiError, ApiResult};
use crate::observer::{EngineOp, LookupOutcome, NoopObserver, QueryObserver, WriteOutcome};
use crate::session::SessionId;
use crate::source::SeriesSource;
use mps_profile::{z_normalize, AnnotationKind, MatrixProfile, MotifGroup, ProfileEngine, ProfileError};

/// Corrected arc curve of a fresh computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    pub cac: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifsResponse {
    pub groups: Vec<MotifGroup>,
    /// Z-normalized member subsequences, one list per group
    pub series: Vec<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordsResponse {
    pub groups: Vec<usize>,
    /// Z-normalized subsequence at each discord
    pub series: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationResponse {
    pub annotation_vector: Vec<f64>,
    pub adjusted_mp: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct RouterSettings {
    pub request_timeout: Duration,
    pub discord_exclusion_divisor: usize,
}

pub struct QueryRouter {
    source: Arc<dyn SeriesSource>,
    engine: Arc<ProfileEngine>,
    cache: ArtifactCache,
    observer: Arc<dyn QueryObserver>,
    settings: RouterSettings,
}

impl QueryRouter {
    pub fn new(
        source: Arc<dyn SeriesSource>,
        engine: Arc<ProfileEngine>,
        cache: ArtifactCache,
        settings: RouterSettings,
    ) -> Self {
        Self {
            source,
            engine,
            cache,
            observer: Arc::new(NoopObserver),
            settings,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn QueryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Raw series as served by the source
    pub async fn data(&self) -> ApiResult<Vec<f64>> {
        let deadline = self.deadline();
        Ok(self.bounded(deadline, "series load", self.source.load()).await??)
    }

    /// Compute the session's matrix profile for window length `window`,
    /// replace its cached artifact and return the corrected arc curve.
    pub async fn compute(&self, session: &SessionId, window: i64) -> ApiResult<Segmentation> {
        if window <= 0 {
            return Err(ApiError::InvalidParameter(format!(
                "window length m must be a positive integer, got {window}"
            )));
        }
        let deadline = self.deadline();

        let series = self.bounded(deadline, "series load", self.source.load()).await??;
        let window = usize::try_from(window)
            .ok()
            .filter(|m| *m < series.len())
            .ok_or_else(|| {
                ApiError::InvalidParameter(format!(
                    "window length m must be less than the series length {}, got {window}",
                    series.len()
                ))
            })?;

        let engine = Arc::clone(&self.engine);
        let artifact = self
            .run_engine(deadline, EngineOp::Compute, move || engine.compute(&series, window))
            .await?;
        let cac = artifact.corrected_arc_curve();

        self.store(deadline, session, Arc::new(artifact)).await?;
        info!(%session, window, points = cac.len(), "Matrix profile computed");
        Ok(Segmentation { cac })
    }

    /// Top `k` motif groups of the cached artifact with group radius `radius`.
    pub async fn top_k_motifs(&self, session: &SessionId, k: i64, radius: f64) -> ApiResult<MotifsResponse> {
        let k = positive_count("k", k)?;
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ApiError::InvalidParameter(format!(
                "r must be a positive number, got {radius}"
            )));
        }
        let deadline = self.deadline();

        let artifact = Arc::new(self.load(deadline, session, "motifs").await?);
        let groups = {
            let artifact = Arc::clone(&artifact);
            self.run_engine(deadline, EngineOp::Motifs, move || artifact.top_k_motifs(k, radius))
                .await?
        };

        let series = groups
            .iter()
            .map(|group| {
                group
                    .idx
                    .iter()
                    .map(|&start| normalized_subsequence(&artifact, start))
                    .collect::<ApiResult<Vec<_>>>()
            })
            .collect::<ApiResult<Vec<_>>>()?;

        debug!(%session, k, groups = groups.len(), "Motifs found");
        Ok(MotifsResponse { groups, series })
    }

    /// Top `k` discords of the cached artifact.
    pub async fn top_k_discords(&self, session: &SessionId, k: i64) -> ApiResult<DiscordsResponse> {
        let k = positive_count("k", k)?;
        let deadline = self.deadline();

        let artifact = Arc::new(self.load(deadline, session, "discords").await?);
        let zone = artifact.window() / self.settings.discord_exclusion_divisor.max(1);
        let groups = {
            let artifact = Arc::clone(&artifact);
            self.run_engine(deadline, EngineOp::Discords, move || artifact.top_k_discords(k, zone))
                .await?
        };

        let series = groups
            .iter()
            .map(|&start| normalized_subsequence(&artifact, start))
            .collect::<ApiResult<Vec<_>>>()?;

        debug!(%session, k, zone, "Discords found");
        Ok(DiscordsResponse { groups, series })
    }

    /// Switch the cached artifact to the annotation vector `name` and return
    /// the vector together with the adjusted profile.
    pub async fn set_annotation_vector(&self, session: &SessionId, name: &str) -> ApiResult<AnnotationResponse> {
        let kind: AnnotationKind = name
            .parse()
            .map_err(|e: ProfileError| ApiError::InvalidParameter(e.to_string()))?;
        let deadline = self.deadline();

        let artifact = self.load(deadline, session, "annotation vectors").await?;
        let updated = Arc::new(artifact.with_annotation(kind));
        self.store(deadline, session, Arc::clone(&updated)).await?;

        let (annotation_vector, adjusted_mp) = self
            .run_engine(deadline, EngineOp::Annotation, move || {
                let av = updated.annotation_vector();
                let adjusted = updated.apply_annotation(&av)?;
                Ok((av, adjusted))
            })
            .await?;

        info!(%session, annotation = %kind, "Annotation vector applied");
        Ok(AnnotationResponse {
            annotation_vector,
            adjusted_mp,
        })
    }

    /// Drop the session's artifact.
    pub async fn discard(&self, session: &SessionId) -> ApiResult<()> {
        let deadline = self.deadline();
        self.bounded(deadline, "artifact removal", self.cache.invalidate(session))
            .await?
            .map_err(|e| self.cache_failure(session, "remove", e))?;
        debug!(%session, "Session artifact discarded");
        Ok(())
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.settings.request_timeout
    }

    async fn bounded<T>(&self, deadline: Instant, what: &str, work: impl Future<Output = T>) -> ApiResult<T> {
        tokio::time::timeout_at(deadline, work).await.map_err(|_| {
            warn!(what, limit = ?self.settings.request_timeout, "Request deadline exceeded");
            ApiError::Timeout(format!(
                "{what} exceeded the {:?} request deadline",
                self.settings.request_timeout
            ))
        })
    }

    async fn load(&self, deadline: Instant, session: &SessionId, purpose: &str) -> ApiResult<MatrixProfile> {
        let lookup = self.bounded(deadline, "artifact lookup", self.cache.get(session)).await;
        match lookup {
            Ok(Ok(Some(artifact))) => {
                self.observer.cache_lookup(LookupOutcome::Hit);
                Ok(artifact)
            }
            Ok(Ok(None)) => {
                self.observer.cache_lookup(LookupOutcome::Miss);
                debug!(%session, purpose, "No cached matrix profile");
                Err(ApiError::CacheExpired(format!(
                    "matrix profile is not initialized to compute {purpose}"
                )))
            }
            Ok(Err(e)) => {
                self.observer.cache_lookup(LookupOutcome::Error);
                Err(self.cache_failure(session, "lookup", e))
            }
            Err(timeout) => {
                self.observer.cache_lookup(LookupOutcome::Error);
                Err(timeout)
            }
        }
    }

    /// Write `artifact` and report what the store did.
    ///
    /// No write starts once the request deadline has passed. A started write
    /// runs in its own task so a dropped request cannot cut it off halfway,
    /// and is awaited to completion; the store operation timeout bounds it.
    async fn store(&self, deadline: Instant, session: &SessionId, artifact: Arc<MatrixProfile>) -> ApiResult<()> {
        if Instant::now() >= deadline {
            warn!(%session, limit = ?self.settings.request_timeout, "Request deadline passed before artifact write");
            return Err(ApiError::Timeout(format!(
                "artifact write skipped: the {:?} request deadline passed",
                self.settings.request_timeout
            )));
        }

        let cache = self.cache.clone();
        let observer = Arc::clone(&self.observer);
        let key = session.clone();
        let write = tokio::spawn(async move {
            let result = cache.put(&key, &artifact).await;
            match &result {
                Ok(bytes) => observer.cache_write(WriteOutcome::Stored, *bytes),
                Err(CacheError::TooLarge { size, .. }) => observer.cache_write(WriteOutcome::Rejected, *size),
                Err(_) => observer.cache_write(WriteOutcome::Error, 0),
            }
            result
        });

        match write.await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(self.cache_failure(session, "write", e)),
            Err(join) => Err(ApiError::StoreUnavailable(format!("artifact write task failed: {join}"))),
        }
    }

    fn cache_failure(&self, session: &SessionId, op: &str, err: CacheError) -> ApiError {
        match &err {
            CacheError::TooLarge { size, max } => {
                warn!(%session, size, max, "Artifact rejected by cache size limit");
            }
            _ => warn!(%session, op, error = %err, "Artifact store failure"),
        }
        err.into()
    }

    async fn run_engine<T, F>(&self, deadline: Instant, op: EngineOp, work: F) -> ApiResult<T>
    where
        F: FnOnce() -> mps_profile::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let started = std::time::Instant::now();
        let outcome = self
            .bounded(deadline, op.as_str(), tokio::task::spawn_blocking(work))
            .await;

        let result = match outcome {
            Ok(Ok(result)) => result.map_err(|e| {
                warn!(operation = op.as_str(), error = %e, "Engine call failed");
                ApiError::from(e)
            }),
            Ok(Err(join)) => Err(ApiError::ComputationFailed(format!("engine task failed: {join}"))),
            Err(timeout) => Err(timeout),
        };
        self.observer.engine_call(op, started.elapsed(), result.is_ok());
        result
    }
}

fn positive_count(name: &str, value: i64) -> ApiResult<usize> {
    usize::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ApiError::InvalidParameter(format!("{name} must be a positive integer, got {value}")))
}

fn normalized_subsequence(artifact: &MatrixProfile, start: usize) -> ApiResult<Vec<f64>> {
    let window = artifact.window();
    let slice = artifact
        .series()
        .get(start..start + window)
        .ok_or_else(|| ApiError::ComputationFailed(format!("subsequence at {start} is out of range")))?;
    z_normalize(slice).map_err(|e| {
        ApiError::ComputationFailed(format!("failed to normalize subsequence at {start}: {e}"))
    })
}
