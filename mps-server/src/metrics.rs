//! Prometheus metrics for mps-server.

use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

use crate::observer::{EngineOp, LookupOutcome, QueryObserver, WriteOutcome};
use crate::AppState;

/// Labels for HTTP request metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabelsWithStatus {
    pub method: HttpMethod,
    pub endpoint: String,
    pub status: String,
}

/// HTTP method label value.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
    Options,
    Other,
}

impl From<&Method> for HttpMethod {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => HttpMethod::Get,
            Method::POST => HttpMethod::Post,
            Method::DELETE => HttpMethod::Delete,
            Method::OPTIONS => HttpMethod::Options,
            _ => HttpMethod::Other,
        }
    }
}

/// Labels for HTTP request latency histogram.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: HttpMethod,
    pub endpoint: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EngineLabels {
    pub operation: String,
    pub outcome: String,
}

/// Container for all Prometheus metrics.
pub struct Metrics {
    registry: Registry,

    /// Counter of HTTP requests.
    pub http_requests_total: Family<HttpLabelsWithStatus, Counter>,

    /// Histogram of HTTP request latency in seconds.
    pub http_request_duration_seconds: Family<HttpLabels, Histogram>,

    /// Gauge of currently in-flight requests.
    pub http_requests_in_flight: Gauge,

    /// Artifact lookups by outcome (hit, miss, error).
    pub artifact_lookups_total: Family<OutcomeLabels, Counter>,

    /// Artifact writes by outcome (stored, rejected, error).
    pub artifact_writes_total: Family<OutcomeLabels, Counter>,

    /// Encoded size of stored artifacts.
    pub artifact_size_bytes: Histogram,

    /// Engine call latency by operation and outcome.
    pub engine_duration_seconds: Family<EngineLabels, Histogram>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics registry with all metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests_total = Family::<HttpLabelsWithStatus, Counter>::default();
        registry.register(
            "http_requests_total",
            "Total number of HTTP requests",
            http_requests_total.clone(),
        );

        // Buckets from 1ms to ~8s
        let http_request_duration_seconds =
            Family::<HttpLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 14))
            });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
            http_request_duration_seconds.clone(),
        );

        let http_requests_in_flight = Gauge::default();
        registry.register(
            "http_requests_in_flight",
            "Number of HTTP requests currently being processed",
            http_requests_in_flight.clone(),
        );

        let artifact_lookups_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "artifact_lookups_total",
            "Matrix profile cache lookups by outcome",
            artifact_lookups_total.clone(),
        );

        let artifact_writes_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "artifact_writes_total",
            "Matrix profile cache writes by outcome",
            artifact_writes_total.clone(),
        );

        // Buckets from 1 KiB to 4 MiB
        let artifact_size_bytes = Histogram::new(exponential_buckets(1024.0, 2.0, 13));
        registry.register(
            "artifact_size_bytes",
            "Encoded size of stored matrix profiles",
            artifact_size_bytes.clone(),
        );

        // Buckets from 1ms to ~65s
        let engine_duration_seconds =
            Family::<EngineLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 17))
            });
        registry.register(
            "engine_duration_seconds",
            "Matrix profile engine call latency in seconds",
            engine_duration_seconds.clone(),
        );

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            artifact_lookups_total,
            artifact_writes_total,
            artifact_size_bytes,
            engine_duration_seconds,
        }
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl QueryObserver for Metrics {
    fn cache_lookup(&self, outcome: LookupOutcome) {
        self.artifact_lookups_total
            .get_or_create(&OutcomeLabels {
                outcome: outcome.as_str().to_string(),
            })
            .inc();
    }

    fn cache_write(&self, outcome: WriteOutcome, bytes: usize) {
        self.artifact_writes_total
            .get_or_create(&OutcomeLabels {
                outcome: outcome.as_str().to_string(),
            })
            .inc();
        if outcome == WriteOutcome::Stored {
            self.artifact_size_bytes.observe(bytes as f64);
        }
    }

    fn engine_call(&self, op: EngineOp, elapsed: Duration, succeeded: bool) {
        let outcome = if succeeded { "ok" } else { "error" };
        self.engine_duration_seconds
            .get_or_create(&EngineLabels {
                operation: op.as_str().to_string(),
                outcome: outcome.to_string(),
            })
            .observe(elapsed.as_secs_f64());
    }
}

/// Record request count, latency and in-flight gauge per matched route.
pub async fn track_http(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = HttpMethod::from(request.method());
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let metrics = &state.metrics;
    metrics.http_requests_in_flight.inc();
    let started = Instant::now();

    let response = next.run(request).await;

    metrics.http_requests_in_flight.dec();
    metrics
        .http_request_duration_seconds
        .get_or_create(&HttpLabels {
            method: method.clone(),
            endpoint: endpoint.clone(),
        })
        .observe(started.elapsed().as_secs_f64());
    metrics
        .http_requests_total
        .get_or_create(&HttpLabelsWithStatus {
            method,
            endpoint,
            status: response.status().as_u16().to_string(),
        })
        .inc();

    response
}
