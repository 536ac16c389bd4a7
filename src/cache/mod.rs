//! Cache Module
//!
//! Provides in-memory caching with TTL expiration and least-used eviction.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Default capacity of the cache store
pub const DEFAULT_MAX_ENTRIES: usize = 100;
