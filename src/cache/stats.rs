//! Cache Statistics Module
//!
//! Snapshot of cache occupancy and usage for monitoring.

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time view of the cache. Building one has no side effects.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,
    /// Configured capacity
    pub max_entries: usize,
    /// Sum of hit counters over the live entries
    pub total_hits: u64,
    /// `total_hits / size`, 0.0 when empty
    pub average_hits_per_entry: f64,
    /// Entries removed to make room for new ones
    pub evictions: u64,
    /// Expired entries removed by reads or sweeps
    pub expirations: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Builds a snapshot from the current live figures.
    pub fn new(
        size: usize,
        max_entries: usize,
        total_hits: u64,
        evictions: u64,
        expirations: u64,
    ) -> Self {
        let average_hits_per_entry = if size == 0 {
            0.0
        } else {
            total_hits as f64 / size as f64
        };

        Self {
            size,
            max_entries,
            total_hits,
            average_hits_per_entry,
            evictions,
            expirations,
        }
    }

    // == Utilization ==
    /// Fraction of capacity in use.
    pub fn utilization(&self) -> f64 {
        if self.max_entries == 0 {
            0.0
        } else {
            self.size as f64 / self.max_entries as f64
        }
    }
}
