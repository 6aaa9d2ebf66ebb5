//! In-memory cache storage
//!
//! Keeps namespaces in creation order behind a single lock, which makes each
//! namespace operation atomic with respect to the others.

use crate::error::{SwCacheError, SwCacheResult};
use crate::host::storage::CacheStorage;
use crate::http::{Request, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

struct Namespace {
    name: String,
    entries: HashMap<String, Response>,
}

/// Cache storage held entirely in process memory
#[derive(Default)]
pub struct MemoryCacheStorage {
    namespaces: RwLock<Vec<Namespace>>,
}

impl MemoryCacheStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries stored in a namespace, `None` if absent
    pub async fn entry_count(&self, namespace: &str) -> Option<usize> {
        self.namespaces
            .read()
            .await
            .iter()
            .find(|ns| ns.name == namespace)
            .map(|ns| ns.entries.len())
    }
}

fn keyed_entries(
    namespace: &str,
    entries: Vec<(Request, Response)>,
) -> SwCacheResult<Vec<(String, Response)>> {
    entries
        .into_iter()
        .map(|(request, response)| {
            request
                .cache_key()
                .map(|key| (key, response))
                .ok_or_else(|| {
                    SwCacheError::storage(
                        namespace,
                        format!("cannot store {} request for {}", request.method, request.url),
                    )
                })
        })
        .collect()
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, namespace: &str) -> SwCacheResult<()> {
        let mut namespaces = self.namespaces.write().await;
        if !namespaces.iter().any(|ns| ns.name == namespace) {
            debug!("Creating namespace {}", namespace);
            namespaces.push(Namespace {
                name: namespace.to_string(),
                entries: HashMap::new(),
            });
        }
        Ok(())
    }

    async fn has(&self, namespace: &str) -> SwCacheResult<bool> {
        Ok(self
            .namespaces
            .read()
            .await
            .iter()
            .any(|ns| ns.name == namespace))
    }

    async fn put_all(
        &self,
        namespace: &str,
        entries: Vec<(Request, Response)>,
    ) -> SwCacheResult<()> {
        let keyed = keyed_entries(namespace, entries)?;

        let mut namespaces = self.namespaces.write().await;
        let index = match namespaces.iter().position(|ns| ns.name == namespace) {
            Some(index) => index,
            None => {
                namespaces.push(Namespace {
                    name: namespace.to_string(),
                    entries: HashMap::new(),
                });
                namespaces.len() - 1
            }
        };

        namespaces[index].entries.extend(keyed);
        Ok(())
    }

    async fn match_in(
        &self,
        namespace: &str,
        request: &Request,
    ) -> SwCacheResult<Option<Response>> {
        let Some(key) = request.cache_key() else {
            return Ok(None);
        };

        Ok(self
            .namespaces
            .read()
            .await
            .iter()
            .find(|ns| ns.name == namespace)
            .and_then(|ns| ns.entries.get(&key).cloned()))
    }

    async fn keys(&self) -> SwCacheResult<Vec<String>> {
        Ok(self
            .namespaces
            .read()
            .await
            .iter()
            .map(|ns| ns.name.clone())
            .collect())
    }

    async fn delete(&self, namespace: &str) -> SwCacheResult<bool> {
        let mut namespaces = self.namespaces.write().await;
        let before = namespaces.len();
        namespaces.retain(|ns| ns.name != namespace);
        Ok(namespaces.len() != before)
    }

    fn storage_name(&self) -> &'static str {
        "memory"
    }
}
