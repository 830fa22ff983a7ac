//! Series sources
//!
//! A source yields the time series every session analyzes. File and HTTP
//! sources read a JSON document of the form `{"data": [..]}` and shape it
//! (smoothing, then truncation) before handing it out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{SourceConfig, SourceKind};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed series document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("series is empty")]
    Empty,
}

/// On-disk / over-the-wire series document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDocument {
    pub data: Vec<f64>,
}

#[async_trait]
pub trait SeriesSource: Send + Sync {
    async fn load(&self) -> Result<Vec<f64>, SourceError>;

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// Post-processing applied to loaded series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesShaping {
    pub smoothing_window: usize,
    pub max_points: Option<usize>,
}

impl SeriesShaping {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            smoothing_window: config.smoothing_window,
            max_points: config.max_points,
        }
    }

    /// Leave the series untouched
    pub fn raw() -> Self {
        Self {
            smoothing_window: 0,
            max_points: None,
        }
    }

    pub fn apply(&self, data: Vec<f64>) -> Vec<f64> {
        let mut shaped = if self.smoothing_window > 1 {
            smooth(&data, self.smoothing_window)
        } else {
            data
        };
        if let Some(max) = self.max_points {
            shaped.truncate(max);
        }
        shaped
    }
}

/// Centered moving average of width `window`, narrowed at the edges.
pub fn smooth(data: &[f64], window: usize) -> Vec<f64> {
    if data.is_empty() || window <= 1 {
        return data.to_vec();
    }

    let half = window / 2;
    let mut prefix = Vec::with_capacity(data.len() + 1);
    prefix.push(0.0);
    for value in data {
        prefix.push(prefix[prefix.len() - 1] + value);
    }

    (0..data.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(data.len());
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

fn finish(data: Vec<f64>, shaping: &SeriesShaping) -> Result<Vec<f64>, SourceError> {
    let shaped = shaping.apply(data);
    if shaped.is_empty() {
        return Err(SourceError::Empty);
    }
    Ok(shaped)
}

/// Series read from a local JSON file
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    shaping: SeriesShaping,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, shaping: SeriesShaping) -> Self {
        Self {
            path: path.into(),
            shaping,
        }
    }
}

#[async_trait]
impl SeriesSource for FileSource {
    async fn load(&self) -> Result<Vec<f64>, SourceError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let document: SeriesDocument = serde_json::from_slice(&bytes)?;
        debug!(path = %self.path.display(), points = document.data.len(), "Loaded series file");
        finish(document.data, &self.shaping)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Series fetched from an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    shaping: SeriesShaping,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration, shaping: SeriesShaping) -> Result<Self, SourceError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| SourceError::Http {
                url: url.clone(),
                source,
            })?;
        Ok(Self { client, url, shaping })
    }
}

#[async_trait]
impl SeriesSource for HttpSource {
    async fn load(&self) -> Result<Vec<f64>, SourceError> {
        let http_error = |source| SourceError::Http {
            url: self.url.clone(),
            source,
        };
        let document: SeriesDocument = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;
        debug!(url = %self.url, points = document.data.len(), "Fetched series");
        finish(document.data, &self.shaping)
    }

    fn describe(&self) -> String {
        format!("http {}", self.url)
    }
}

/// Fixed in-memory series, served as given
#[derive(Debug, Clone)]
pub struct StaticSource {
    data: Arc<Vec<f64>>,
}

impl StaticSource {
    pub fn new(data: Vec<f64>) -> Self {
        Self { data: Arc::new(data) }
    }
}

#[async_trait]
impl SeriesSource for StaticSource {
    async fn load(&self) -> Result<Vec<f64>, SourceError> {
        if self.data.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(self.data.as_ref().clone())
    }

    fn describe(&self) -> String {
        format!("static ({} points)", self.data.len())
    }
}

/// Build the configured source.
pub fn create_source(config: &SourceConfig, timeout: Duration) -> Result<Arc<dyn SeriesSource>, SourceError> {
    let shaping = SeriesShaping::from_config(config);
    Ok(match &config.kind {
        SourceKind::File { path } => Arc::new(FileSource::new(path.clone(), shaping)),
        SourceKind::Http { url } => Arc::new(HttpSource::new(url.clone(), timeout, shaping)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_smooth_centered_average() {
        let smoothed = smooth(&[0.0, 0.0, 3.0, 0.0, 0.0], 3);
        assert_eq!(smoothed, vec![0.0, 1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_smooth_narrows_at_edges() {
        let smoothed = smooth(&[2.0, 4.0, 6.0], 5);
        assert_eq!(smoothed, vec![4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_smooth_preserves_constant() {
        assert!(smooth(&[7.5; 40], 21).iter().all(|v| (v - 7.5).abs() < 1e-12));
    }

    #[test]
    fn test_shaping_truncates_after_smoothing() {
        let shaping = SeriesShaping {
            smoothing_window: 3,
            max_points: Some(2),
        };
        assert_eq!(shaping.apply(vec![3.0, 0.0, 0.0, 9.0]), vec![1.5, 1.0]);

        let short = SeriesShaping {
            smoothing_window: 0,
            max_points: Some(10),
        };
        assert_eq!(short.apply(vec![1.0, 2.0]), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_file_source_reads_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"data": [1.0, 2.0, 3.0, 4.0]}}"#).unwrap();

        let source = FileSource::new(file.path(), SeriesShaping::raw());
        assert_eq!(source.load().await.unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_file_source_errors() {
        let missing = FileSource::new("/nonexistent/penguin.json", SeriesShaping::raw());
        assert!(matches!(missing.load().await, Err(SourceError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"values": [1.0]}}"#).unwrap();
        let malformed = FileSource::new(file.path(), SeriesShaping::raw());
        assert!(matches!(malformed.load().await, Err(SourceError::Parse(_))));

        let mut empty = tempfile::NamedTempFile::new().unwrap();
        write!(empty, r#"{{"data": []}}"#).unwrap();
        let empty = FileSource::new(empty.path(), SeriesShaping::raw());
        assert!(matches!(empty.load().await, Err(SourceError::Empty)));
    }

    #[tokio::test]
    async fn test_http_source_fetches_document() {
        use axum::{routing::get, Json, Router};

        let app = Router::new().route(
            "/series",
            get(|| async {
                Json(SeriesDocument {
                    data: vec![5.0, 6.0, 7.0],
                })
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let source = HttpSource::new(
            format!("http://{addr}/series"),
            Duration::from_secs(5),
            SeriesShaping::raw(),
        )
        .unwrap();
        assert_eq!(source.load().await.unwrap(), vec![5.0, 6.0, 7.0]);

        let missing = HttpSource::new(
            format!("http://{addr}/absent"),
            Duration::from_secs(5),
            SeriesShaping::raw(),
        )
        .unwrap();
        assert!(matches!(missing.load().await, Err(SourceError::Http { .. })));
    }
}
