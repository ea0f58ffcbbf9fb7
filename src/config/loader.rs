//! Configuration Loader
//!
//! Layers built-in defaults, an optional TOML file and `ROUTE_ORCHESTRATOR`
//! environment variables (`__` between path segments, e.g.
//! `ROUTE_ORCHESTRATOR__RETRY__MAX_ATTEMPTS=5`) into a validated
//! [`OrchestratorConfig`].

use super::OrchestratorConfig;
use crate::error::{Result, RouteError};
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ENV_PREFIX: &str = "ROUTE_ORCHESTRATOR";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: OrchestratorConfig,
    source_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Built-in defaults only
    pub fn from_defaults() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            source_file: None,
        }
    }

    /// Load a TOML file over the defaults, without environment overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::build(Some(path), false)
    }

    /// Load defaults, then the optional file, then environment overrides
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        Self::build(path, true)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn into_config(self) -> OrchestratorConfig {
        self.config
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    fn build(path: Option<&Path>, with_env: bool) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(RouteError::Configuration(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        if with_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: OrchestratorConfig = builder
            .build()
            .and_then(|raw| raw.try_deserialize())
            .map_err(|e| RouteError::Configuration(e.to_string()))?;

        config.validate()?;

        info!(
            source = %path.map_or_else(|| "defaults".to_string(), |p| p.display().to_string()),
            cache_entries = config.cache.max_entries,
            retry_attempts = config.retry.max_attempts,
            failure_threshold = config.circuit_breaker.failure_threshold,
            "⚙️ Configuration loaded"
        );

        Ok(Self {
            config,
            source_file: path.map(Path::to_path_buf),
        })
    }
}
