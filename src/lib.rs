//! swcache - Offline asset cache worker
//!
//! Preloads a fixed asset manifest into one cache generation at install,
//! removes every other generation at activation, and answers each
//! intercepted request either straight from the network (API and upload
//! traffic) or cache-first.

pub mod config;
pub mod error;
pub mod host;
pub mod http;
pub mod logging;
pub mod worker;

pub use config::{WorkerConfig, ASSET_MANIFEST, CACHE_GENERATION_NAME};
pub use error::{SwCacheError, SwCacheResult};
pub use worker::{RouteDecision, ServiceWorker, WorkerState};
