//! Configuration management for swcache

pub mod schema;
pub mod worker;

pub use schema::Config;
pub use worker::{WorkerConfig, ASSET_MANIFEST, CACHE_GENERATION_NAME, DEFAULT_SCOPE};

use crate::error::{SwCacheError, SwCacheResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name, looked up next to the worker build
pub const CONFIG_FILE_NAME: &str = "swcache.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager reading `swcache.toml` from `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config_path: dir.join(CONFIG_FILE_NAME),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> SwCacheResult<Config> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> SwCacheResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| SwCacheError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| SwCacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the file and build the worker configuration from it
    pub async fn load_worker_config(&self) -> SwCacheResult<WorkerConfig> {
        let config = self.load().await?;
        config.worker_config()
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> SwCacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                SwCacheError::io(format!("creating config directory {}", parent.display()), e)
            })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            SwCacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}
