//! Network answering from a fixed route table
//!
//! Used to simulate the host network in tests and offline drills. Every
//! request is recorded so callers can assert how often the network was hit.

use crate::error::{SwCacheError, SwCacheResult};
use crate::host::network::Network;
use crate::http::{cache_key_for, Request, Response};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Route {
    Respond(Response),
    Fail(String),
}

/// Network stub with canned responses per URL
#[derive(Debug, Default)]
pub struct StubNetwork {
    routes: HashMap<String, Route>,
    offline: bool,
    calls: Mutex<Vec<Request>>,
}

impl StubNetwork {
    /// Create a stub with no routes; unknown URLs answer 404
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stub where every request fails as if offline
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Answer `url` with `response`
    pub fn route(mut self, url: &str, response: Response) -> Self {
        self.routes.insert(normalize(url), Route::Respond(response));
        self
    }

    /// Fail requests to `url` with a transport error
    pub fn fail(mut self, url: &str, reason: impl Into<String>) -> Self {
        self.routes.insert(normalize(url), Route::Fail(reason.into()));
        self
    }

    /// Requests seen so far, in arrival order
    pub fn calls(&self) -> Vec<Request> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Number of requests seen so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

fn normalize(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| cache_key_for(&u))
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> SwCacheResult<Response> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }

        if self.offline {
            return Err(SwCacheError::network(request.url.as_str(), "offline"));
        }

        match self.routes.get(&cache_key_for(&request.url)) {
            Some(Route::Respond(response)) => Ok(response.clone()),
            Some(Route::Fail(reason)) => Err(SwCacheError::network(request.url.as_str(), reason)),
            None => Ok(Response::new(404, "Not Found").with_status_text("Not Found")),
        }
    }

    fn network_name(&self) -> &'static str {
        "stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn answers_routes_and_records_calls() {
        let network = StubNetwork::new()
            .route("http://localhost:5000/", Response::new(200, "index"))
            .fail("http://localhost:5000/down", "connection reset");

        let ok = network
            .fetch(&Request::get(Url::parse("http://localhost:5000/").unwrap()))
            .await
            .unwrap();
        assert_eq!(ok.body, b"index");

        let missing = network
            .fetch(&Request::get(Url::parse("http://localhost:5000/nope").unwrap()))
            .await
            .unwrap();
        assert_eq!(missing.status, 404);

        let err = network
            .fetch(&Request::get(Url::parse("http://localhost:5000/down").unwrap()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));

        assert_eq!(network.call_count(), 3);
    }

    #[tokio::test]
    async fn offline_fails_everything() {
        let network =
            StubNetwork::offline().route("http://localhost:5000/", Response::new(200, ""));
        let err = network
            .fetch(&Request::get(Url::parse("http://localhost:5000/").unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, SwCacheError::Network { .. }));
    }
}
