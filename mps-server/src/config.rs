//! Server configuration
//!
//! Resolution priority: command line > environment > TOML file > compiled
//! default. clap's `env` attributes in `main.rs` cover the first two and are
//! folded in through [`Overrides`]; this module owns the file layer and the
//! defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8081;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Deadline applied to every request's cache and engine work
    pub request_timeout_ms: u64,
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub source: SourceConfig,
    pub session: SessionConfig,
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            request_timeout_ms: 30_000,
            engine: EngineConfig::default(),
            cache: CacheConfig::default(),
            source: SourceConfig::default(),
            session: SessionConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads used by one profile computation
    pub concurrency: usize,
    /// Discord exclusion zone is `window / discord_exclusion_divisor`
    pub discord_exclusion_divisor: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            discord_exclusion_divisor: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Artifact lifetime, counted from the last write
    pub retention_secs: u64,
    /// Largest encoded artifact the cache accepts
    pub max_artifact_bytes: usize,
    pub purge_interval_secs: u64,
    /// Upper bound on a single store round trip
    pub operation_timeout_ms: u64,
    pub backend: StoreConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retention_secs: 300,
            max_artifact_bytes: 1024 * 1024,
            purge_interval_secs: 60,
            operation_timeout_ms: 2_000,
            backend: StoreConfig::InMemory,
        }
    }
}

impl CacheConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// Artifact store backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    #[default]
    InMemory,
    Redis { url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Moving-average width; 0 or 1 leaves the series untouched
    pub smoothing_window: usize,
    /// Truncate longer series to this many points
    pub max_points: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            smoothing_window: 21,
            max_points: Some(24 * 60 * 7),
        }
    }
}

/// Where the series document comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    File { path: PathBuf },
    Http { url: String },
}

impl Default for SourceKind {
    fn default() -> Self {
        SourceKind::File {
            path: PathBuf::from("./penguin_data.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Add the `Secure` attribute to issued cookies
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "mps_session".to_string(),
            secure_cookie: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:8080".to_string()],
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub redis_url: Option<String>,
    pub data_path: Option<PathBuf>,
    pub data_url: Option<String>,
    pub concurrency: Option<usize>,
}

impl ServerConfig {
    /// Load configuration from an optional TOML file.
    ///
    /// A missing file yields the defaults (logged at `warn`); a file that
    /// exists but cannot be parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given, using defaults");
            return Ok(Self::default());
        };

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Fold command line / environment values over the file values.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(url) = overrides.redis_url {
            self.cache.backend = StoreConfig::Redis { url };
        }
        if let Some(path) = overrides.data_path {
            self.source.kind = SourceKind::File { path };
        }
        if let Some(url) = overrides.data_url {
            self.source.kind = SourceKind::Http { url };
        }
        if let Some(concurrency) = overrides.concurrency {
            self.engine.concurrency = concurrency;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.engine.concurrency == 0, "engine.concurrency must be at least 1"),
            (
                self.engine.discord_exclusion_divisor == 0,
                "engine.discord_exclusion_divisor must be at least 1",
            ),
            (self.request_timeout_ms == 0, "request_timeout_ms must be positive"),
            (self.cache.retention_secs == 0, "cache.retention_secs must be positive"),
            (self.cache.max_artifact_bytes == 0, "cache.max_artifact_bytes must be positive"),
            (self.cache.purge_interval_secs == 0, "cache.purge_interval_secs must be positive"),
            (self.cache.operation_timeout_ms == 0, "cache.operation_timeout_ms must be positive"),
            (self.session.cookie_name.is_empty(), "session.cookie_name must not be empty"),
        ];
        if let Some((_, message)) = checks.iter().find(|(failed, _)| *failed) {
            return Err(ConfigError::Invalid((*message).to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8081);
        assert_eq!(config.engine.concurrency, 2);
        assert_eq!(config.engine.discord_exclusion_divisor, 2);
        assert_eq!(config.cache.retention(), Duration::from_secs(300));
        assert_eq!(config.cache.max_artifact_bytes, 1_048_576);
        assert_eq!(config.source.smoothing_window, 21);
        assert_eq!(config.source.max_points, Some(10_080));
        assert_eq!(config.session.cookie_name, "mps_session");
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:8080"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            port = 9000

            [cache]
            retention_secs = 60

            [cache.backend]
            type = "redis"
            url = "redis://cache:6379"

            [source.kind]
            type = "http"
            url = "http://data.local/penguin.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.cache.retention_secs, 60);
        assert_eq!(config.cache.max_artifact_bytes, 1_048_576);
        assert_eq!(
            config.cache.backend,
            StoreConfig::Redis {
                url: "redis://cache:6379".to_string()
            }
        );
        assert_eq!(
            config.source.kind,
            SourceKind::Http {
                url: "http://data.local/penguin.json".to_string()
            }
        );
        assert_eq!(config.engine.concurrency, 2);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_unparsable_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let err = ServerConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = ServerConfig::default();
        config.apply(Overrides {
            port: Some(7000),
            redis_url: Some("redis://localhost".to_string()),
            data_path: Some(PathBuf::from("/tmp/series.json")),
            data_url: None,
            concurrency: Some(8),
        });

        assert_eq!(config.port, 7000);
        assert_eq!(config.engine.concurrency, 8);
        assert!(matches!(config.cache.backend, StoreConfig::Redis { .. }));
        assert_eq!(
            config.source.kind,
            SourceKind::File {
                path: PathBuf::from("/tmp/series.json")
            }
        );
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = ServerConfig::default();
        config.engine.concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
