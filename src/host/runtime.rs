//! Host runtime harness
//!
//! Owns the shared cache storage and network and fires lifecycle events at a
//! worker in the host's order: install, then activate, then any number of
//! fetches. Fetches the worker leaves unhandled take the host's normal
//! network path.

use crate::config::WorkerConfig;
use crate::error::SwCacheResult;
use crate::host::events::{FetchEvent, ResponseSource};
use crate::host::network::Network;
use crate::host::storage::CacheStorage;
use crate::http::{Request, Response};
use crate::worker::{InstallReport, ReapReport, ServiceWorker};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Response delivered to the page for one request
#[derive(Debug)]
pub struct FetchResult {
    /// Id of the fetch event that produced it
    pub event_id: Uuid,
    /// Where the response came from
    pub source: ResponseSource,
    /// The response, or the network failure the page observes
    pub outcome: SwCacheResult<Response>,
}

/// Simulated host runtime
#[derive(Clone)]
pub struct HostRuntime {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
}

impl HostRuntime {
    /// Create a host around shared storage and network
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self { storage, network }
    }

    /// Cache storage shared by every worker version on this host
    pub fn storage(&self) -> &dyn CacheStorage {
        self.storage.as_ref()
    }

    /// Network used both by workers and by the host's own path
    pub fn network(&self) -> &dyn Network {
        self.network.as_ref()
    }

    /// Fire the install event and wait for it to settle
    pub async fn install(&self, worker: &mut ServiceWorker) -> SwCacheResult<InstallReport> {
        debug!(
            "Dispatching install to {} (storage: {}, network: {})",
            worker.config().generation(),
            self.storage.storage_name(),
            self.network.network_name()
        );
        worker.install(self.storage(), self.network()).await
    }

    /// Fire the activate event and wait for it to settle
    pub async fn activate(&self, worker: &mut ServiceWorker) -> SwCacheResult<ReapReport> {
        debug!("Dispatching activate to {}", worker.config().generation());
        worker.activate(self.storage()).await
    }

    /// Load a worker version and run it through install and activate
    pub async fn register(&self, config: WorkerConfig) -> SwCacheResult<ServiceWorker> {
        let mut worker = ServiceWorker::new(config);
        self.install(&mut worker).await?;
        self.activate(&mut worker).await?;
        info!("Worker {} controls the page", worker.config().generation());
        Ok(worker)
    }

    /// Issue a page request, letting `controller` intercept it if it is active
    pub async fn fetch(&self, controller: Option<&ServiceWorker>, request: Request) -> FetchResult {
        let mut event = FetchEvent::new(request);
        let event_id = event.id();

        if let Some(worker) = controller.filter(|w| w.state().can_intercept_fetch()) {
            if let Err(e) = worker
                .handle_fetch(&mut event, self.storage(), self.network())
                .await
            {
                warn!(event_id = %event_id, "Fetch handler failed, using network: {}", e);
            }
        }

        let (request, response) = event.into_parts();
        match response {
            Some((source, outcome)) => {
                debug!(event_id = %event_id, "Answered {} from {}", request, source);
                FetchResult {
                    event_id,
                    source,
                    outcome,
                }
            }
            None => {
                debug!(event_id = %event_id, "Passing {} through to network", request);
                FetchResult {
                    event_id,
                    source: ResponseSource::Passthrough,
                    outcome: self.network.fetch(&request).await,
                }
            }
        }
    }
}
