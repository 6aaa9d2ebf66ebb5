//! Host runtime abstractions
//!
//! The worker never talks to a browser directly. It sees:
//! - [`CacheStorage`]: namespaced request/response store
//! - [`Network`]: outbound fetch
//! - [`events`]: lifecycle events and the fetch-event override
//!
//! Implementations: [`MemoryCacheStorage`], [`DiskCacheStorage`],
//! [`HttpNetwork`] and the route-table [`StubNetwork`]. [`HostRuntime`]
//! drives a worker through its lifecycle the way a host would.

mod disk;
pub mod events;
mod http_network;
mod memory;
mod network;
mod runtime;
mod storage;
mod stub;

pub use disk::DiskCacheStorage;
pub use events::{FetchEvent, LifecycleEvent, ResponseSource};
pub use http_network::HttpNetwork;
pub use memory::MemoryCacheStorage;
pub use network::Network;
pub use runtime::{FetchResult, HostRuntime};
pub use storage::CacheStorage;
pub use stub::StubNetwork;
