//! Network abstraction

use crate::error::SwCacheResult;
use crate::http::{Request, Response};
use async_trait::async_trait;

/// Abstract network fetch interface
///
/// Any HTTP status is a successful fetch; only transport-level failures
/// (offline, DNS, refused connection) are errors.
#[async_trait]
pub trait Network: Send + Sync {
    /// Issue a request and wait for its response
    async fn fetch(&self, request: &Request) -> SwCacheResult<Response>;

    /// Human-readable network name for logs
    fn network_name(&self) -> &'static str;
}
