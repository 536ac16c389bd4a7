//! Cache Store Module
//!
//! Main cache engine: HashMap storage with per-entry TTL and least-used eviction.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheEntry, CacheStats};

// == Cache Store ==
/// Key/value storage bounded by entry count.
///
/// When an insert of a new key would exceed capacity, the entry with the
/// fewest hits is evicted. Ties go to the entry written earliest, so a value
/// that was written and never read is the first to go.
#[derive(Debug)]
pub struct CacheStore<T> {
    /// Key-value storage
    entries: HashMap<String, Slot<T>>,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Write counter used to break eviction ties deterministically
    next_seq: u64,
    /// Entries evicted for capacity
    evictions: u64,
    /// Entries dropped because they expired
    expirations: u64,
}

#[derive(Debug)]
struct Slot<T> {
    seq: u64,
    entry: CacheEntry<T>,
}

impl<T: Clone> CacheStore<T> {
    // == Constructor ==
    /// Creates a new CacheStore holding at most `max_entries` entries (at least one).
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            next_seq: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    // == Set ==
    /// Stores a value under `key` for `ttl`.
    ///
    /// Overwriting resets the hit counter and the write time. Inserting a new
    /// key into a full store first drops expired entries, then evicts the
    /// least-used entry if the store is still full.
    pub fn set(&mut self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.sweep();
            if self.entries.len() >= self.max_entries {
                self.evict_least_used();
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key,
            Slot {
                seq,
                entry: CacheEntry::new(value, ttl),
            },
        );
    }

    // == Get ==
    /// Returns the value for `key` if present and fresh.
    ///
    /// An expired entry is removed as a side effect. A successful read bumps
    /// the entry's hit counter.
    pub fn get(&mut self, key: &str) -> Option<T> {
        let slot = self.entries.get_mut(key)?;

        if slot.entry.is_expired() {
            self.entries.remove(key);
            self.expirations += 1;
            debug!(key, "cache entry expired on read");
            return None;
        }

        slot.entry.record_hit();
        Some(slot.entry.value.clone())
    }

    // == Peek Fresh ==
    /// Reports whether `key` holds a fresh value, without touching hit counters.
    pub fn peek_fresh(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|slot| !slot.entry.is_expired())
            .unwrap_or(false)
    }

    // == Delete ==
    /// Removes a single key, returning whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Invalidate ==
    /// Removes every key containing `pattern` as a substring.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&mut self, pattern: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.contains(pattern));
        before - self.entries.len()
    }

    // == Clear ==
    /// Removes everything, returning the number of entries dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    // == Sweep ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.entry.is_expired());
        let count = before - self.entries.len();
        self.expirations += count as u64;
        count
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let total_hits = self.entries.values().map(|slot| slot.entry.hit_count).sum();
        CacheStats::new(
            self.entries.len(),
            self.max_entries,
            total_hits,
            self.evictions,
            self.expirations,
        )
    }

    // == Hit Count ==
    /// Returns the hit counter of a stored entry, fresh or not.
    pub fn hit_count(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|slot| slot.entry.hit_count)
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the configured capacity.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn evict_least_used(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| (slot.entry.hit_count, slot.seq))
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            self.entries.remove(&key);
            self.evictions += 1;
            debug!(key = %key, "evicted least-used cache entry");
        }
    }
}
