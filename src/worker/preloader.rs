//! Install handler: preload the asset manifest into the current generation
//!
//! All manifest entries are fetched before anything is written, so a single
//! failing entry leaves the namespace exactly as it was.

use crate::config::WorkerConfig;
use crate::error::{SwCacheError, SwCacheResult};
use crate::host::{CacheStorage, Network};
use crate::http::{cache_key_for, Request, Response};
use futures_util::future::try_join_all;
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

/// Outcome of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Generation that was populated
    pub generation: String,
    /// Manifest entries fetched and stored, duplicates included
    pub stored: usize,
    /// Manifest entries that repeated an earlier key
    pub duplicates: usize,
}

fn install_error(config: &WorkerConfig, locator: &str, err: SwCacheError) -> SwCacheError {
    SwCacheError::Install {
        generation: config.generation().to_string(),
        locator: locator.to_string(),
        reason: err.to_string(),
    }
}

async fn fetch_entry(
    config: &WorkerConfig,
    network: &dyn Network,
    locator: &str,
    url: Url,
) -> SwCacheResult<(Request, Response)> {
    let request = Request::get(url);
    let response = network
        .fetch(&request)
        .await
        .map_err(|e| install_error(config, locator, e))?;

    if !response.ok() {
        return Err(install_error(
            config,
            locator,
            SwCacheError::BadStatus {
                url: request.url.to_string(),
                status: response.status,
            },
        ));
    }

    debug!("Fetched {} ({} bytes)", request.url, response.body.len());
    Ok((request, response))
}

/// Populate the current generation with every manifest entry.
///
/// Fails without writing any entry if a locator is malformed, a fetch fails
/// at the transport level, or a response status is outside 200-299.
pub async fn install(
    config: &WorkerConfig,
    storage: &dyn CacheStorage,
    network: &dyn Network,
) -> SwCacheResult<InstallReport> {
    let generation = config.generation();
    info!(
        "Installing generation {} ({} assets)",
        generation,
        config.manifest().len()
    );

    storage
        .open(generation)
        .await
        .map_err(|e| install_error(config, generation, e))?;

    let mut targets = Vec::with_capacity(config.manifest().len());
    for locator in config.manifest() {
        let url = config
            .resolve_locator(locator)
            .map_err(|e| install_error(config, locator, e))?;
        targets.push((locator.as_str(), url));
    }

    let mut seen = HashSet::new();
    let duplicates = targets
        .iter()
        .filter(|(_, url)| !seen.insert(cache_key_for(url)))
        .count();
    if duplicates > 0 {
        debug!(
            "Manifest for {} repeats {} entr{}; last write wins",
            generation,
            duplicates,
            if duplicates == 1 { "y" } else { "ies" }
        );
    }

    let entries = try_join_all(
        targets
            .into_iter()
            .map(|(locator, url)| fetch_entry(config, network, locator, url)),
    )
    .await?;

    let stored = entries.len();
    storage
        .put_all(generation, entries)
        .await
        .map_err(|e| install_error(config, generation, e))?;

    info!("Installed generation {} with {} assets", generation, stored);
    Ok(InstallReport {
        generation: generation.to_string(),
        stored,
        duplicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryCacheStorage, StubNetwork};
    use crate::worker::policy::RoutingPolicy;

    fn config(manifest: &[&str]) -> WorkerConfig {
        WorkerConfig::new(
            "v1",
            "http://localhost:5000/",
            manifest.iter().map(|s| s.to_string()).collect(),
            RoutingPolicy::default(),
        )
        .unwrap()
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn stores_every_manifest_entry() {
        let config = config(&[
            "/",
            "/static/icon.png",
            "https://unpkg.com/axios/dist/axios.min.js",
        ]);
        let storage = MemoryCacheStorage::new();
        let network = StubNetwork::new()
            .route("http://localhost:5000/", Response::new(200, "index"))
            .route("http://localhost:5000/static/icon.png", Response::new(200, "png"))
            .route("https://unpkg.com/axios/dist/axios.min.js", Response::new(200, "js"));

        let report = install(&config, &storage, &network).await.unwrap();

        assert_eq!(report.stored, 3);
        assert_eq!(report.duplicates, 0);
        assert_eq!(storage.entry_count("v1").await, Some(3));
        let hit = storage
            .match_in("v1", &get("https://unpkg.com/axios/dist/axios.min.js"))
            .await
            .unwrap();
        assert_eq!(hit.unwrap().body, b"js");
    }

    #[tokio::test]
    async fn not_found_entry_fails_whole_install() {
        let config = config(&["/", "/static/icon.png"]);
        let storage = MemoryCacheStorage::new();
        let network =
            StubNetwork::new().route("http://localhost:5000/", Response::new(200, "index"));

        let err = install(&config, &storage, &network).await.unwrap_err();

        match err {
            SwCacheError::Install { locator, reason, .. } => {
                assert_eq!(locator, "/static/icon.png");
                assert!(reason.contains("404"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(storage.entry_count("v1").await, Some(0));
    }

    #[tokio::test]
    async fn network_failure_fails_install() {
        let config = config(&["/"]);
        let storage = MemoryCacheStorage::new();
        let network = StubNetwork::offline();

        let err = install(&config, &storage, &network).await.unwrap_err();
        assert!(matches!(err, SwCacheError::Install { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_locator_fails_before_fetching() {
        let config = config(&["/", "http://[::1"]);
        let storage = MemoryCacheStorage::new();
        let network = StubNetwork::new().route("http://localhost:5000/", Response::new(200, ""));

        let err = install(&config, &storage, &network).await.unwrap_err();
        assert!(err.to_string().contains("http://[::1"));
        assert_eq!(network.call_count(), 0);
    }

    #[tokio::test]
    async fn duplicates_are_fetched_and_counted() {
        let config = config(&["/", "/static/icon.png", "/"]);
        let storage = MemoryCacheStorage::new();
        let network = StubNetwork::new()
            .route("http://localhost:5000/", Response::new(200, "index"))
            .route("http://localhost:5000/static/icon.png", Response::new(200, "png"));

        let report = install(&config, &storage, &network).await.unwrap();

        assert_eq!(report.stored, 3);
        assert_eq!(report.duplicates, 1);
        assert_eq!(network.call_count(), 3);
        assert_eq!(storage.entry_count("v1").await, Some(2));
    }

    #[tokio::test]
    async fn empty_manifest_creates_namespace() {
        let config = config(&[]);
        let storage = MemoryCacheStorage::new();
        let network = StubNetwork::new();

        let report = install(&config, &storage, &network).await.unwrap();
        assert_eq!(report.stored, 0);
        assert!(storage.has("v1").await.unwrap());
    }
}
