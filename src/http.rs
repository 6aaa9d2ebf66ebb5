//! Request and response values exchanged with the host runtime
//!
//! These mirror what the host hands to fetch handlers and what its cache
//! storage keeps per entry. Bodies are plain bytes; stored entries encode
//! them as hex so they survive the JSON entry files of the disk store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// An intercepted outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Upper-case HTTP method
    pub method: String,
    /// Absolute request URL
    pub url: Url,
    /// Request headers (lower-case names)
    pub headers: BTreeMap<String, String>,
    /// Request body, empty for GET/HEAD
    pub body: Vec<u8>,
}

impl Request {
    /// Create a request with the given method
    pub fn new(method: impl AsRef<str>, url: Url) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            url,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    /// Create a GET request
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Add a header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Key this request is stored under in cache storage.
    ///
    /// Only GET requests participate in cache matching; the fragment is
    /// never part of the key.
    pub fn cache_key(&self) -> Option<String> {
        if self.method != "GET" {
            return None;
        }
        Some(cache_key_for(&self.url))
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Cache key for a URL: the URL serialized without its fragment
pub fn cache_key_for(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// A response produced by the network or read back from cache storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Reason phrase
    #[serde(default)]
    pub status_text: String,
    /// Response headers (lower-case names)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Response body
    #[serde(with = "hex_body", default)]
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response with a status and body
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Set the reason phrase
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// Whether the status is in the 200-299 range
    pub fn ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Look up a header by name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

mod hex_body {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}
