//! Fetch handler: bypass or cache-first-then-network
//!
//! | Class | Cache lookup | Network | Stored |
//! |-------|--------------|---------|--------|
//! | Bypass | never | host's own path | never |
//! | Cacheable, hit | yes | never | - |
//! | Cacheable, miss | yes | exactly once | never |

use crate::config::WorkerConfig;
use crate::host::CacheStorage;
use crate::http::{Request, Response};
use std::fmt;
use tracing::{debug, warn};

/// Classification of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Must reach the network untouched
    Bypass,
    /// May be answered from cache
    Cacheable,
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bypass => write!(f, "bypass"),
            Self::Cacheable => write!(f, "cacheable"),
        }
    }
}

/// What the worker wants the host to do with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Leave the request alone; the host sends it over its normal path
    Bypass,
    /// Answer with a stored response
    ServeFromCache(Response),
    /// Answer with whatever the network returns for this request
    FetchNetwork(Request),
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bypass => write!(f, "bypass"),
            Self::ServeFromCache(response) => write!(f, "cache ({})", response.status),
            Self::FetchNetwork(_) => write!(f, "network"),
        }
    }
}

/// Classify a request by its URL. Pure and synchronous.
pub fn classify(config: &WorkerConfig, request: &Request) -> RouteClass {
    if config.policy().is_bypass(&request.url) {
        RouteClass::Bypass
    } else {
        RouteClass::Cacheable
    }
}

/// Decide how to answer a request, consulting the cache for cacheable ones.
///
/// The lookup searches every namespace still present, in the host's default
/// order. A failed lookup is treated as a miss.
pub async fn decide(
    config: &WorkerConfig,
    storage: &dyn CacheStorage,
    request: &Request,
) -> RouteDecision {
    let class = classify(config, request);
    debug!("Classified {} as {}", request, class);
    if class == RouteClass::Bypass {
        return RouteDecision::Bypass;
    }

    match storage.match_request(request).await {
        Ok(Some(response)) => {
            debug!("Cache hit for {}", request);
            RouteDecision::ServeFromCache(response)
        }
        Ok(None) => {
            debug!("Cache miss for {}", request);
            RouteDecision::FetchNetwork(request.clone())
        }
        Err(e) => {
            warn!("Cache lookup failed for {}, using network: {}", request, e);
            RouteDecision::FetchNetwork(request.clone())
        }
    }
}
