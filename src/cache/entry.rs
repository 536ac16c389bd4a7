//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and hit tracking.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The stored value
    pub value: T,
    /// When the value was written
    pub stored_at: Instant,
    /// How long the value stays fresh
    pub ttl: Duration,
    /// Successful reads since the last write; only used to rank evictions
    pub hit_count: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current time.
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
            hit_count: 0,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once strictly more than `ttl` has elapsed since it
    /// was stored. At exactly `ttl` it is still served.
    pub fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }

    // == Time To Live ==
    /// Returns the remaining freshness window, `Duration::ZERO` once elapsed.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.stored_at.elapsed())
    }

    // == Record Hit ==
    /// Counts one successful read.
    pub fn record_hit(&mut self) {
        self.hit_count += 1;
    }
}
