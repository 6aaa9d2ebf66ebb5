//! The cache worker: one version's install, activate and fetch handlers
//!
//! # Lifecycle
//!
//! | State | Event accepted | Next on success | Next on failure |
//! |-------|----------------|-----------------|-----------------|
//! | Parsed | install | Installed | Redundant |
//! | Installed | activate | Activated | Installed |
//! | Activated | fetch | Activated | Activated |
//!
//! A redundant worker never handles another event; the host starts a new
//! version instead.

pub mod policy;
pub mod preloader;
pub mod reaper;
pub mod router;

pub use policy::{BypassRule, RoutingPolicy};
pub use preloader::InstallReport;
pub use reaper::ReapReport;
pub use router::{RouteClass, RouteDecision};

use crate::config::WorkerConfig;
use crate::error::{SwCacheError, SwCacheResult};
use crate::host::events::{apply_decision, FetchEvent, LifecycleEvent};
use crate::host::{CacheStorage, Network};
use crate::http::Request;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Loaded, not yet installed
    Parsed,
    /// Install handler running
    Installing,
    /// Install succeeded, waiting to take control
    Installed,
    /// Activate handler running
    Activating,
    /// In control; intercepts fetches
    Activated,
    /// Install failed; this version is discarded
    Redundant,
}

impl WorkerState {
    /// Whether fetch events are routed to the worker
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, Self::Activated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed => write!(f, "parsed"),
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

/// One version of the cache worker
#[derive(Debug)]
pub struct ServiceWorker {
    config: WorkerConfig,
    state: WorkerState,
}

impl ServiceWorker {
    /// Load a worker version with its configuration
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            state: WorkerState::Parsed,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Configuration this version was built with
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    fn expect_state(&self, event: LifecycleEvent, expected: WorkerState) -> SwCacheResult<()> {
        if self.state != expected {
            return Err(SwCacheError::InvalidState {
                event: event.to_string(),
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    /// Handle the install event: preload the manifest
    pub async fn install(
        &mut self,
        storage: &dyn CacheStorage,
        network: &dyn Network,
    ) -> SwCacheResult<InstallReport> {
        self.expect_state(LifecycleEvent::Install, WorkerState::Parsed)?;
        self.state = WorkerState::Installing;

        match preloader::install(&self.config, storage, network).await {
            Ok(report) => {
                self.state = WorkerState::Installed;
                Ok(report)
            }
            Err(e) => {
                warn!("Install of {} failed: {}", self.config.generation(), e);
                self.state = WorkerState::Redundant;
                Err(e)
            }
        }
    }

    /// Handle the activate event: reap stale generations
    pub async fn activate(&mut self, storage: &dyn CacheStorage) -> SwCacheResult<ReapReport> {
        self.expect_state(LifecycleEvent::Activate, WorkerState::Installed)?;
        self.state = WorkerState::Activating;

        match reaper::activate(&self.config, storage).await {
            Ok(report) => {
                info!("Generation {} is now active", self.config.generation());
                self.state = WorkerState::Activated;
                Ok(report)
            }
            Err(e) => {
                warn!("Activation of {} failed: {}", self.config.generation(), e);
                self.state = WorkerState::Installed;
                Err(e)
            }
        }
    }

    /// Route one fetch without acting on it
    pub async fn route(
        &self,
        storage: &dyn CacheStorage,
        request: &Request,
    ) -> SwCacheResult<RouteDecision> {
        self.expect_state(LifecycleEvent::Fetch, WorkerState::Activated)?;
        Ok(router::decide(&self.config, storage, request).await)
    }

    /// Handle a fetch event, overriding its response unless it bypasses
    pub async fn handle_fetch(
        &self,
        event: &mut FetchEvent,
        storage: &dyn CacheStorage,
        network: &dyn Network,
    ) -> SwCacheResult<()> {
        let decision = self.route(storage, event.request()).await?;
        debug!(event_id = %event.id(), "Fetch {} routed as {}", event.request(), decision);
        apply_decision(event, decision, network).await
    }
}
