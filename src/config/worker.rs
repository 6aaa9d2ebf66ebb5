//! Immutable per-version worker configuration
//!
//! Built once when the worker starts and passed by reference to the
//! preloader, reaper and router.

use crate::error::{SwCacheError, SwCacheResult};
use crate::worker::policy::RoutingPolicy;
use url::Url;

/// Name of the cache generation owned by this worker version
pub const CACHE_GENERATION_NAME: &str = "lot-monitor-v1";

/// Resources that must be cached before this version can install
pub const ASSET_MANIFEST: &[&str] = &[
    "/",
    "/static/icon.png",
    "https://unpkg.com/bootstrap@5.3.0/dist/css/bootstrap.min.css",
    "https://unpkg.com/vue@3/dist/vue.global.prod.js",
    "https://unpkg.com/axios/dist/axios.min.js",
];

/// Origin the worker is registered under; relative locators resolve against it
pub const DEFAULT_SCOPE: &str = "http://localhost:5000/";

/// Configuration shared by all lifecycle handlers of one worker version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    generation: String,
    scope: Url,
    manifest: Vec<String>,
    policy: RoutingPolicy,
}

impl WorkerConfig {
    /// Create a configuration, validating the generation name and scope
    pub fn new(
        generation: impl Into<String>,
        scope: &str,
        manifest: Vec<String>,
        policy: RoutingPolicy,
    ) -> SwCacheResult<Self> {
        let generation = generation.into();
        if generation.trim().is_empty() {
            return Err(SwCacheError::WorkerConfig(
                "generation name must not be empty".to_string(),
            ));
        }

        let scope = Url::parse(scope).map_err(|e| {
            SwCacheError::WorkerConfig(format!("scope '{}' is not an absolute URL: {}", scope, e))
        })?;
        if scope.cannot_be_a_base() {
            return Err(SwCacheError::WorkerConfig(format!(
                "scope '{}' cannot be used as a base URL",
                scope
            )));
        }

        Ok(Self {
            generation,
            scope,
            manifest,
            policy,
        })
    }

    /// Configuration built from the compiled-in constants
    pub fn builtin() -> SwCacheResult<Self> {
        Self::new(
            CACHE_GENERATION_NAME,
            DEFAULT_SCOPE,
            ASSET_MANIFEST.iter().map(|s| s.to_string()).collect(),
            RoutingPolicy::default(),
        )
    }

    /// Current generation name
    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Scope URL
    pub fn scope(&self) -> &Url {
        &self.scope
    }

    /// Manifest locators as configured
    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    /// Routing policy
    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// Resolve one locator against the scope
    pub fn resolve_locator(&self, locator: &str) -> SwCacheResult<Url> {
        if locator.trim().is_empty() {
            return Err(SwCacheError::InvalidLocator {
                locator: locator.to_string(),
                reason: "empty locator".to_string(),
            });
        }

        let url = self
            .scope
            .join(locator)
            .map_err(|e| SwCacheError::InvalidLocator {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(SwCacheError::InvalidLocator {
                locator: locator.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            }),
        }
    }

    /// Resolve every manifest locator, in manifest order
    pub fn resolve_manifest(&self) -> SwCacheResult<Vec<Url>> {
        self.manifest
            .iter()
            .map(|locator| self.resolve_locator(locator))
            .collect()
    }
}
