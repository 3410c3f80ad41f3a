//! Edge caching for expensive, shared responses.
//!
//! - `store`: key/value backends (`CacheBackend`, in-memory implementation)
//! - `refresh`: bounded background refreshes deduplicated by key
//! - `edge`: the stale-while-revalidate state machine
//! - `config`: TTL, threshold and retention tuning

pub mod config;
pub mod edge;
mod lock;
pub mod refresh;
pub mod store;

pub use config::EdgeCacheConfig;
pub use edge::{CacheFill, CacheStatus, Cached, EdgeCache, FillError, now_ms};
pub use refresh::{BackgroundRefresher, RefreshSkip};
pub use store::{CacheBackend, CacheError, MemoryCacheBackend};
