//! mps-server library interface
//!
//! Session-scoped matrix profile service: a client computes the profile of
//! the served series once per session, then issues cheap motif, discord and
//! annotation queries against the cached result.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod observer;
pub mod router;
pub mod session;
pub mod source;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::{middleware, Router};
use chrono::{DateTime, Utc};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::cache::{ArtifactCache, ArtifactStore};
use crate::config::{CorsConfig, ServerConfig};
use crate::metrics::Metrics;
use crate::router::{QueryRouter, RouterSettings};
use crate::source::SeriesSource;
use mps_profile::{ProfileEngine, ProfileError};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<QueryRouter>,
    pub metrics: Arc<Metrics>,
    pub config: Arc<ServerConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the engine, cache and metrics around a series source and store.
    pub fn new(
        config: ServerConfig,
        source: Arc<dyn SeriesSource>,
        store: Arc<dyn ArtifactStore>,
    ) -> Result<Self, ProfileError> {
        let engine = Arc::new(ProfileEngine::new(config.engine.concurrency)?);
        let cache = ArtifactCache::new(store, &config.cache);
        let metrics = Arc::new(Metrics::new());
        let router = QueryRouter::new(
            source,
            engine,
            cache,
            RouterSettings {
                request_timeout: config.request_timeout(),
                discord_exclusion_divisor: config.engine.discord_exclusion_divisor,
            },
        )
        .with_observer(metrics.clone());

        Ok(Self {
            router: Arc::new(router),
            metrics,
            config: Arc::new(config),
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let analysis = api::analysis_routes().layer(middleware::from_fn_with_state(
        state.clone(),
        session::session_middleware,
    ));

    Router::new()
        .nest("/api/v1", analysis)
        .merge(api::health_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), metrics::track_http))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors))
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
}
