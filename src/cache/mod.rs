//! Durable caches shared by every refresh worker.
//!
//! Two typed repositories sit over the same [`CacheBackend`] seam: the
//! [`ExpirationCache`] keyed by descriptor path and the [`IgnoreList`] keyed by
//! title id. Each holds one async mutex across "mutate in memory + flush", so
//! concurrent workers never interleave partial writes.

mod backend;
mod expirations;
mod ignored;

pub use backend::{CacheBackend, JsonFileBackend, MemoryBackend};
pub use expirations::ExpirationCache;
pub use ignored::{IgnoreEntry, IgnoreList};
