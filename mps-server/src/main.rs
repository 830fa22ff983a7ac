//! mps-server - Matrix profile session server
//!
//! Serves one time series and lets each browser session compute its matrix
//! profile, then query motifs, discords and annotation-adjusted profiles
//! against the cached result.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mps_server::cache::{create_store, spawn_purge_task};
use mps_server::clock::SystemClock;
use mps_server::config::{Overrides, ServerConfig};
use mps_server::source::create_source;
use mps_server::AppState;

/// Command-line arguments for mps-server
#[derive(Parser, Debug)]
#[command(name = "mps-server")]
#[command(about = "Session-scoped matrix profile server")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "MPS_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "MPS_PORT")]
    port: Option<u16>,

    /// Redis URL; selects the shared artifact store
    #[arg(long, env = "MPS_REDIS_URL")]
    redis_url: Option<String>,

    /// JSON series document on disk
    #[arg(long, env = "MPS_DATA_PATH", conflicts_with = "data_url")]
    data_path: Option<PathBuf>,

    /// JSON series document over HTTP
    #[arg(long, env = "MPS_DATA_URL")]
    data_url: Option<String>,

    /// Worker threads per profile computation
    #[arg(long, env = "MPS_ENGINE_CONCURRENCY")]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mps_server=info,mps_profile=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting mps-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.apply(Overrides {
        port: args.port,
        redis_url: args.redis_url,
        data_path: args.data_path,
        data_url: args.data_url,
        concurrency: args.concurrency,
    });
    config.validate().context("Invalid configuration")?;

    let source = create_source(&config.source, config.request_timeout())
        .context("Failed to initialize series source")?;
    info!("Series source: {}", source.describe());

    let store = create_store(&config.cache.backend, Arc::new(SystemClock))
        .await
        .context("Failed to initialize artifact store")?;
    info!(
        "Artifact store: {} (retention {}s, limit {} bytes)",
        store.backend(),
        config.cache.retention_secs,
        config.cache.max_artifact_bytes
    );

    let addr = config.socket_addr();
    let purge_every = config.cache.purge_interval();
    let concurrency = config.engine.concurrency;

    let state = AppState::new(config, source, store).context("Failed to initialize profile engine")?;
    info!("Profile engine initialized with {} workers", concurrency);

    let purge = spawn_purge_task(state.router.cache().clone(), purge_every);
    let app = mps_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    purge.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
