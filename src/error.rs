//! Error types for swcache
//!
//! All modules use `SwCacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for swcache operations
pub type SwCacheResult<T> = Result<T, SwCacheError>;

/// All errors that can occur in swcache
#[derive(Error, Debug)]
pub enum SwCacheError {
    // Install errors
    #[error("Install of generation {generation} failed on {locator}: {reason}")]
    Install {
        generation: String,
        locator: String,
        reason: String,
    },

    #[error("Invalid manifest locator {locator}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("Unexpected status {status} for {url}")]
    BadStatus { url: String, status: u16 },

    // Network errors
    #[error("Network error for {url}: {reason}")]
    Network { url: String, reason: String },

    // Storage errors
    #[error("Cache storage error in {namespace}: {reason}")]
    Storage { namespace: String, reason: String },

    // Activation errors
    #[error("Activation of generation {generation} failed: {}", .failures.join("; "))]
    Activation {
        generation: String,
        failures: Vec<String>,
    },

    // Lifecycle errors
    #[error("Cannot handle {event} event while worker is {state}")]
    InvalidState { event: String, state: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid worker configuration: {0}")]
    WorkerConfig(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage error for a namespace
    pub fn storage(namespace: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Storage {
            namespace: namespace.into(),
            reason: reason.into(),
        }
    }

    /// Check if the host may retry the failed lifecycle step later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Install { .. }
                | Self::Network { .. }
                | Self::BadStatus { .. }
                | Self::Storage { .. }
                | Self::Activation { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Install { .. } => {
                Some("The previous worker stays in control until install succeeds")
            }
            Self::InvalidLocator { .. } => {
                Some("Manifest locators must be absolute URLs or paths relative to the scope")
            }
            Self::InvalidState { .. } => {
                Some("Events must be fired in order: install, activate, fetch")
            }
            _ => None,
        }
    }
}
