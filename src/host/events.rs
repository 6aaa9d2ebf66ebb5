//! Lifecycle events delivered by the host and the fetch-event binding
//!
//! The worker reports its routing choice as a [`RouteDecision`];
//! [`apply_decision`] turns it into the host-side action: no override for
//! a bypass, a cached response, or a network response.

use crate::error::{SwCacheError, SwCacheResult};
use crate::host::network::Network;
use crate::http::{Request, Response};
use crate::worker::router::RouteDecision;
use std::fmt;
use uuid::Uuid;

/// Lifecycle events fired by the host runtime, in their strict order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Install,
    Activate,
    Fetch,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Activate => write!(f, "activate"),
            Self::Fetch => write!(f, "fetch"),
        }
    }
}

/// Where the response to a fetch event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Stored response from cache storage
    Cache,
    /// Network fetch issued by the worker after a cache miss
    Network,
    /// Host's normal network path; the worker did not respond
    Passthrough,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
            Self::Passthrough => write!(f, "passthrough"),
        }
    }
}

/// One intercepted request awaiting an optional override
#[derive(Debug)]
pub struct FetchEvent {
    id: Uuid,
    request: Request,
    response: Option<(ResponseSource, SwCacheResult<Response>)>,
}

impl FetchEvent {
    /// Create an event for an outbound request
    pub fn new(request: Request) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            response: None,
        }
    }

    /// Event id used to correlate log lines
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The intercepted request
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Override the host's response. Only one override is allowed per event.
    pub fn respond_with(
        &mut self,
        source: ResponseSource,
        outcome: SwCacheResult<Response>,
    ) -> SwCacheResult<()> {
        if self.response.is_some() {
            return Err(SwCacheError::InvalidState {
                event: LifecycleEvent::Fetch.to_string(),
                state: "already responded".to_string(),
            });
        }
        self.response = Some((source, outcome));
        Ok(())
    }

    /// Whether the worker overrode the response
    pub fn was_responded(&self) -> bool {
        self.response.is_some()
    }

    /// Consume the event, returning the request and the override, if any
    pub fn into_parts(self) -> (Request, Option<(ResponseSource, SwCacheResult<Response>)>) {
        (self.request, self.response)
    }
}

/// Translate a routing decision into the matching host action on `event`
pub async fn apply_decision(
    event: &mut FetchEvent,
    decision: RouteDecision,
    network: &dyn Network,
) -> SwCacheResult<()> {
    match decision {
        RouteDecision::Bypass => Ok(()),
        RouteDecision::ServeFromCache(response) => {
            event.respond_with(ResponseSource::Cache, Ok(response))
        }
        RouteDecision::FetchNetwork(request) => {
            let outcome = network.fetch(&request).await;
            event.respond_with(ResponseSource::Network, outcome)
        }
    }
}
