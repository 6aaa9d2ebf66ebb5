//! Routing policy: which requests must always go to the network
//!
//! A request matching any bypass rule is never served from cache and never
//! observed by the worker. Everything else is cacheable.
//!
//! Rules match against the parsed URL rather than the raw string so a
//! static asset such as `/static/upload.png` is not mistaken for the upload
//! endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// A single bypass matcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BypassRule {
    /// Any path segment equals this value (`api` matches `/api/lots` and `/v2/api/x`)
    PathSegment(String),
    /// The URL path starts with this prefix (`/upload` matches `/upload` and `/upload/batch`)
    PathPrefix(String),
    /// The full URL contains this text anywhere
    Substring(String),
}

impl BypassRule {
    /// Whether this rule selects the bypass branch for `url`
    pub fn matches(&self, url: &Url) -> bool {
        match self {
            Self::PathSegment(segment) => url
                .path_segments()
                .map(|mut segments| segments.any(|s| s == segment))
                .unwrap_or(false),
            Self::PathPrefix(prefix) => url.path().starts_with(prefix.as_str()),
            Self::Substring(text) => url.as_str().contains(text.as_str()),
        }
    }
}

impl fmt::Display for BypassRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathSegment(s) => write!(f, "segment '{}'", s),
            Self::PathPrefix(p) => write!(f, "prefix '{}'", p),
            Self::Substring(t) => write!(f, "substring '{}'", t),
        }
    }
}

/// Ordered list of bypass rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    rules: Vec<BypassRule>,
}

impl RoutingPolicy {
    /// Create a policy from explicit rules
    pub fn new(rules: Vec<BypassRule>) -> Self {
        Self { rules }
    }

    /// Policy matching raw URL substrings `/api/` and `/upload`
    pub fn substring_markers() -> Self {
        Self::new(vec![
            BypassRule::Substring("/api/".to_string()),
            BypassRule::Substring("/upload".to_string()),
        ])
    }

    /// The configured rules, in evaluation order
    pub fn rules(&self) -> &[BypassRule] {
        &self.rules
    }

    /// First rule matching `url`, if any
    pub fn matching_rule(&self, url: &Url) -> Option<&BypassRule> {
        self.rules.iter().find(|rule| rule.matches(url))
    }

    /// Whether `url` must bypass the cache
    pub fn is_bypass(&self, url: &Url) -> bool {
        self.matching_rule(url).is_some()
    }
}

impl Default for RoutingPolicy {
    /// Bypass the data API (`/api/...`) and the upload endpoint (`/upload...`)
    ///
    /// Rules look at the path only, whatever the origin. The prefix rule
    /// also bypasses root-level names such as `/uploader.css`, while a path
    /// that merely ends in `upload` (`https://cdn.example/files/upload`) stays
    /// cacheable. Use [`RoutingPolicy::substring_markers`] to match the raw
    /// URL text instead.
    fn default() -> Self {
        Self::new(default_bypass_rules())
    }
}

/// Rules used when no routing section is configured
pub fn default_bypass_rules() -> Vec<BypassRule> {
    vec![
        BypassRule::PathSegment("api".to_string()),
        BypassRule::PathPrefix("/upload".to_string()),
    ]
}
