//! Cache storage abstraction
//!
//! Provides a trait for the host's namespaced request/response store so the
//! worker can run against an in-memory store in tests and a durable store
//! elsewhere.

use crate::error::SwCacheResult;
use crate::http::{Request, Response};
use async_trait::async_trait;

/// Abstract cache storage interface
///
/// Namespaces are listed in creation order. Within a namespace entries are
/// keyed by [`Request::cache_key`].
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a namespace, creating it if absent
    async fn open(&self, namespace: &str) -> SwCacheResult<()>;

    /// Check if a namespace exists
    async fn has(&self, namespace: &str) -> SwCacheResult<bool>;

    /// Store a batch of entries into a namespace as one unit.
    ///
    /// Either every entry is written or none is. Later entries with the same
    /// key overwrite earlier ones.
    async fn put_all(&self, namespace: &str, entries: Vec<(Request, Response)>)
        -> SwCacheResult<()>;

    /// Look up a request in one namespace
    async fn match_in(&self, namespace: &str, request: &Request)
        -> SwCacheResult<Option<Response>>;

    /// All namespace names, in creation order
    async fn keys(&self) -> SwCacheResult<Vec<String>>;

    /// Delete a namespace and all its entries. Returns `false` if it was absent.
    async fn delete(&self, namespace: &str) -> SwCacheResult<bool>;

    /// Look up a request across all namespaces, in creation order
    async fn match_request(&self, request: &Request) -> SwCacheResult<Option<Response>> {
        if request.cache_key().is_none() {
            return Ok(None);
        }

        for namespace in self.keys().await? {
            if let Some(response) = self.match_in(&namespace, request).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    /// Human-readable storage name for logs
    fn storage_name(&self) -> &'static str;
}
