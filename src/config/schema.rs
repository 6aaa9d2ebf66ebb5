//! Configuration schema for swcache
//!
//! Deployments may ship a `swcache.toml` next to the worker build; every
//! section is optional and falls back to the compiled-in constants.

use crate::config::worker::{WorkerConfig, ASSET_MANIFEST, CACHE_GENERATION_NAME, DEFAULT_SCOPE};
use crate::error::SwCacheResult;
use crate::worker::policy::{default_bypass_rules, BypassRule, RoutingPolicy};
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Generation and manifest settings
    pub worker: WorkerSection,

    /// Request routing settings
    pub routing: RoutingConfig,
}

impl Config {
    /// Build the immutable worker configuration from this file
    pub fn worker_config(&self) -> SwCacheResult<WorkerConfig> {
        WorkerConfig::new(
            self.worker.generation.clone(),
            &self.worker.scope,
            self.worker.manifest.clone(),
            RoutingPolicy::new(self.routing.bypass.clone()),
        )
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Cache generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// Current cache generation name
    pub generation: String,

    /// Scope URL the worker is registered under
    pub scope: String,

    /// Locators preloaded at install
    pub manifest: Vec<String>,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            generation: CACHE_GENERATION_NAME.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            manifest: ASSET_MANIFEST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Request routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Requests matching any of these rules always go to the network
    pub bypass: Vec<BypassRule>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            bypass: default_bypass_rules(),
        }
    }
}
