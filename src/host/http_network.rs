//! Network implementation over real HTTP
//!
//! Uses a blocking `ureq` agent on tokio's blocking pool. HTTP error
//! statuses come back as ordinary responses; only transport failures are
//! reported as [`SwCacheError::Network`].

use crate::error::{SwCacheError, SwCacheResult};
use crate::host::network::Network;
use crate::http::{Request, Response};
use async_trait::async_trait;
use tracing::debug;

/// Network backed by a shared `ureq` agent
#[derive(Clone)]
pub struct HttpNetwork {
    agent: ureq::Agent,
}

impl HttpNetwork {
    /// Create a network client that does not treat 4xx/5xx as errors
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    fn with_headers<B>(
        mut builder: ureq::RequestBuilder<B>,
        request: &Request,
    ) -> ureq::RequestBuilder<B> {
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    fn fetch_blocking(agent: &ureq::Agent, request: &Request) -> SwCacheResult<Response> {
        let url = request.url.as_str();
        let body = request.body.as_slice();

        let result = match request.method.as_str() {
            "GET" => Self::with_headers(agent.get(url), request).call(),
            "HEAD" => Self::with_headers(agent.head(url), request).call(),
            "DELETE" => Self::with_headers(agent.delete(url), request).call(),
            "OPTIONS" => Self::with_headers(agent.options(url), request).call(),
            "POST" => Self::with_headers(agent.post(url), request).send(body),
            "PUT" => Self::with_headers(agent.put(url), request).send(body),
            "PATCH" => Self::with_headers(agent.patch(url), request).send(body),
            other => {
                return Err(SwCacheError::network(
                    url,
                    format!("unsupported method {}", other),
                ))
            }
        };

        let mut response = result.map_err(|e| SwCacheError::network(url, e.to_string()))?;

        let status = response.status();
        let mut converted = Response::new(status.as_u16(), Vec::new())
            .with_status_text(status.canonical_reason().unwrap_or_default());
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                converted = converted.with_header(name.as_str(), value);
            }
        }

        converted.body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| SwCacheError::network(url, format!("reading body: {}", e)))?;

        Ok(converted)
    }
}

impl Default for HttpNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> SwCacheResult<Response> {
        debug!("Fetching {}", request);

        let agent = self.agent.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || Self::fetch_blocking(&agent, &request))
            .await
            .map_err(|e| SwCacheError::Internal(format!("fetch task failed: {}", e)))?
    }

    fn network_name(&self) -> &'static str {
        "http"
    }
}
