//! Integration tests for swcache
//!
//! Drive whole worker versions through a simulated host in the order the
//! host guarantees: install, activate, then fetches.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use swcache::host::{
    CacheStorage, DiskCacheStorage, HostRuntime, MemoryCacheStorage, ResponseSource, StubNetwork,
};
use swcache::http::{Request, Response};
use swcache::worker::{RoutingPolicy, ServiceWorker, WorkerState};
use swcache::{SwCacheError, SwCacheResult, WorkerConfig};
use url::Url;

const ORIGIN: &str = "http://localhost:5000/";

fn config(generation: &str, manifest: &[&str]) -> WorkerConfig {
    WorkerConfig::new(
        generation,
        ORIGIN,
        manifest.iter().map(|s| s.to_string()).collect(),
        RoutingPolicy::default(),
    )
    .unwrap()
}

fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

fn get(path: &str) -> Request {
    Request::get(url(path))
}

fn site() -> StubNetwork {
    StubNetwork::new()
        .route(url("/").as_str(), Response::new(200, "<html>lots</html>"))
        .route(url("/static/icon.png").as_str(), Response::new(200, b"\x89PNG".to_vec()))
        .route(url("/api/lots").as_str(), Response::new(200, "[{\"lot\":1}]"))
        .route(url("/upload").as_str(), Response::new(201, "stored"))
}

/// Memory storage that counts lookups
#[derive(Default)]
struct CountingStorage {
    inner: MemoryCacheStorage,
    lookups: AtomicUsize,
}

impl CountingStorage {
    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStorage for CountingStorage {
    async fn open(&self, namespace: &str) -> SwCacheResult<()> {
        self.inner.open(namespace).await
    }
    async fn has(&self, namespace: &str) -> SwCacheResult<bool> {
        self.inner.has(namespace).await
    }
    async fn put_all(
        &self,
        namespace: &str,
        entries: Vec<(Request, Response)>,
    ) -> SwCacheResult<()> {
        self.inner.put_all(namespace, entries).await
    }
    async fn match_in(
        &self,
        namespace: &str,
        request: &Request,
    ) -> SwCacheResult<Option<Response>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.match_in(namespace, request).await
    }
    async fn keys(&self) -> SwCacheResult<Vec<String>> {
        self.inner.keys().await
    }
    async fn delete(&self, namespace: &str) -> SwCacheResult<bool> {
        self.inner.delete(namespace).await
    }
    fn storage_name(&self) -> &'static str {
        "counting"
    }
}

mod install_tests {
    use super::*;

    #[tokio::test]
    async fn every_manifest_entry_is_served_without_network() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let network = Arc::new(site());
        let host = HostRuntime::new(storage.clone(), network.clone());

        let worker = host
            .register(config("v1", &["/", "/static/icon.png"]))
            .await
            .unwrap();
        let after_install = network.call_count();

        for path in ["/", "/static/icon.png"] {
            let hit = storage.match_in("v1", &get(path)).await.unwrap();
            assert!(hit.is_some(), "{} not cached", path);

            let result = host.fetch(Some(&worker), get(path)).await;
            assert_eq!(result.source, ResponseSource::Cache);
        }
        assert_eq!(network.call_count(), after_install);
    }

    #[tokio::test]
    async fn one_missing_asset_fails_install() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let network = Arc::new(site());
        let host = HostRuntime::new(storage.clone(), network);

        let mut worker = ServiceWorker::new(config("v1", &["/", "/static/gone.png"]));
        let err = host.install(&mut worker).await.unwrap_err();

        assert!(matches!(err, SwCacheError::Install { .. }));
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(storage.match_in("v1", &get("/")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transport_failure_fails_install() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let network = Arc::new(site().fail(url("/static/icon.png").as_str(), "dns failure"));
        let host = HostRuntime::new(storage.clone(), network);

        let err = host
            .register(config("v1", &["/", "/static/icon.png"]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("dns failure"));
        assert_eq!(storage.entry_count("v1").await, Some(0));
    }
}

mod activate_tests {
    use super::*;

    #[tokio::test]
    async fn only_current_generation_survives() {
        let storage = Arc::new(MemoryCacheStorage::new());
        storage
            .put_all("v1", vec![(get("/"), Response::new(200, "old index"))])
            .await
            .unwrap();
        let host = HostRuntime::new(storage.clone(), Arc::new(site()));

        let mut worker = ServiceWorker::new(config("v2", &["/"]));
        host.install(&mut worker).await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["v1", "v2"]);

        let report = host.activate(&mut worker).await.unwrap();

        assert_eq!(report.deleted, vec!["v1"]);
        assert_eq!(storage.keys().await.unwrap(), vec!["v2"]);
        let hit = storage.match_request(&get("/")).await.unwrap().unwrap();
        assert_eq!(hit.body, b"<html>lots</html>");
    }

    #[tokio::test]
    async fn repeated_activation_is_idempotent() {
        let storage = Arc::new(MemoryCacheStorage::new());
        storage.open("v1").await.unwrap();
        let host = HostRuntime::new(storage.clone(), Arc::new(site()));
        let worker_config = config("v2", &["/"]);

        let first = host.register(worker_config.clone()).await.unwrap();
        assert_eq!(first.state(), WorkerState::Activated);
        assert_eq!(storage.keys().await.unwrap(), vec!["v2"]);

        let second = host.register(worker_config).await.unwrap();
        assert_eq!(second.state(), WorkerState::Activated);
        assert_eq!(storage.keys().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn old_worker_falls_back_to_network_after_reap() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let network = Arc::new(site());
        let host = HostRuntime::new(storage.clone(), network.clone());

        let old = host.register(config("v1", &["/static/icon.png"])).await.unwrap();
        host.register(config("v2", &["/"])).await.unwrap();

        let before = network.call_count();
        let result = host.fetch(Some(&old), get("/static/icon.png")).await;

        assert_eq!(result.source, ResponseSource::Network);
        assert!(result.outcome.unwrap().ok());
        assert_eq!(network.call_count(), before + 1);
    }
}

mod fetch_tests {
    use super::*;

    #[tokio::test]
    async fn bypass_never_touches_cache() {
        let storage = Arc::new(CountingStorage::default());
        let network = Arc::new(site());
        let host = HostRuntime::new(storage.clone(), network.clone());
        let worker = host.register(config("v1", &["/"])).await.unwrap();

        // A stale copy of API data must never be served.
        storage
            .put_all("v1", vec![(get("/api/lots"), Response::new(200, "stale"))])
            .await
            .unwrap();
        let lookups = storage.lookups();
        let calls = network.call_count();

        let api = host.fetch(Some(&worker), get("/api/lots")).await;
        let upload = host
            .fetch(
                Some(&worker),
                Request::new("POST", url("/upload")).with_body(b"file".to_vec()),
            )
            .await;

        assert_eq!(api.source, ResponseSource::Passthrough);
        assert_eq!(api.outcome.unwrap().body, b"[{\"lot\":1}]");
        assert_eq!(upload.source, ResponseSource::Passthrough);
        assert_eq!(upload.outcome.unwrap().status, 201);
        assert_eq!(storage.lookups(), lookups);
        assert_eq!(network.call_count(), calls + 2);

        let seen = network.calls();
        let forwarded = &seen[seen.len() - 1];
        assert_eq!(forwarded.method, "POST");
        assert_eq!(forwarded.body, b"file");
    }

    #[tokio::test]
    async fn miss_fetches_once_and_stores_nothing() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let network = Arc::new(site());
        let host = HostRuntime::new(storage.clone(), network.clone());
        let worker = host.register(config("v1", &["/"])).await.unwrap();
        let calls = network.call_count();

        let result = host.fetch(Some(&worker), get("/static/missing.png")).await;

        assert_eq!(result.source, ResponseSource::Network);
        assert_eq!(result.outcome.unwrap().status, 404);
        assert_eq!(network.call_count(), calls + 1);
        assert!(storage
            .match_request(&get("/static/missing.png"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn offline_miss_surfaces_network_error() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let online = HostRuntime::new(storage.clone(), Arc::new(site()));
        let worker = online.register(config("v1", &["/"])).await.unwrap();

        let offline = HostRuntime::new(storage, Arc::new(StubNetwork::offline()));

        let cached = offline.fetch(Some(&worker), get("/")).await;
        assert_eq!(cached.outcome.unwrap().body, b"<html>lots</html>");

        let missing = offline.fetch(Some(&worker), get("/static/app.js")).await;
        assert_eq!(missing.source, ResponseSource::Network);
        assert!(matches!(missing.outcome, Err(SwCacheError::Network { .. })));
    }
}

mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn end_to_end() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let network = Arc::new(site());
        let host = HostRuntime::new(storage.clone(), network.clone());
        let mut worker = ServiceWorker::new(config("v1", &["/", "/static/icon.png"]));

        let installed = host.install(&mut worker).await.unwrap();
        assert_eq!(installed.stored, 2);
        assert_eq!(network.call_count(), 2);

        let reaped = host.activate(&mut worker).await.unwrap();
        assert_eq!(reaped.stale_count(), 0);

        let index = host.fetch(Some(&worker), get("/")).await;
        assert_eq!(index.source, ResponseSource::Cache);
        assert_eq!(network.call_count(), 2);

        let api = host.fetch(Some(&worker), get("/api/lots")).await;
        assert_eq!(api.source, ResponseSource::Passthrough);
        assert_eq!(network.call_count(), 3);

        let missing = host.fetch(Some(&worker), get("/static/missing.png")).await;
        assert_eq!(missing.source, ResponseSource::Network);
        assert_eq!(missing.outcome.unwrap().status, 404);
        assert_eq!(network.call_count(), 4);
        assert!(storage
            .match_in("v1", &get("/static/missing.png"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn end_to_end_on_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let network = Arc::new(site());

        {
            let storage = Arc::new(DiskCacheStorage::new(temp.path()));
            let host = HostRuntime::new(storage.clone(), network.clone());
            host.register(config("v1", &["/", "/static/icon.png"]))
                .await
                .unwrap();
        }

        // New version on a fresh host process reusing the same storage.
        let storage = Arc::new(DiskCacheStorage::new(temp.path()));
        let host = HostRuntime::new(storage.clone(), network.clone());
        let worker = host.register(config("v2", &["/"])).await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["v2"]);

        let icon = host.fetch(Some(&worker), get("/static/icon.png")).await;
        assert_eq!(icon.source, ResponseSource::Network);

        let index = host.fetch(Some(&worker), get("/")).await;
        assert_eq!(index.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn truncated_namespace_on_disk_does_not_block_register() {
        let temp = tempfile::TempDir::new().unwrap();
        let stray = temp.path().join("deadbeef");
        std::fs::create_dir_all(&stray).unwrap();
        std::fs::write(stray.join("namespace.json"), br#"{"name":"lot-mon"#).unwrap();

        let storage = Arc::new(DiskCacheStorage::new(temp.path()));
        let host = HostRuntime::new(storage.clone(), Arc::new(site()));
        let worker = host.register(config("v1", &["/"])).await.unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["v1"]);
        let index = host.fetch(Some(&worker), get("/")).await;
        assert_eq!(index.source, ResponseSource::Cache);
    }
}
