//! Single-Flight Coordinator
//!
//! Owns the cache store and the registry of in-flight fetches. Concurrent
//! callers asking for the same missing key share one underlying fetch.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::{CacheStats, CacheStore};
use crate::error::{FetchError, Result};

/// A settled-once fetch that any number of callers can await.
type SharedFetch<T> = Shared<BoxFuture<'static, Result<T>>>;

// == Single Flight ==
/// Cache-backed fetch deduplication.
///
/// The producer of a fetch runs as its own task: a caller that stops waiting
/// (for example on timeout) abandons its wait, but the fetch keeps going and
/// still populates the cache for everyone else.
pub struct SingleFlight<T> {
    store: Arc<Mutex<CacheStore<T>>>,
    in_flight: Arc<Mutex<HashMap<String, SharedFetch<T>>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a coordinator over a store with the given capacity.
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: Arc::new(Mutex::new(CacheStore::new(max_entries))),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // == Get Or Fetch ==
    /// Returns the cached value for `key`, or fetches it exactly once.
    ///
    /// If another fetch for `key` is already running, this joins it and
    /// `fetcher` is never called. A successful result is cached for `ttl`;
    /// a failure is not cached and is delivered to every joined caller.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetcher: F, ttl: Duration) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(value) = self.store.lock().await.get(key) {
            debug!(key, "cache hit");
            return Ok(value);
        }

        let fetch = {
            let mut in_flight = self.in_flight.lock().await;

            match in_flight.get(key) {
                Some(existing) => {
                    debug!(key, "joining in-flight fetch");
                    existing.clone()
                }
                None => {
                    // The previous producer may have settled between our miss and
                    // taking the registry lock; it writes the store before
                    // unregistering, so a second look is enough.
                    if let Some(value) = self.store.lock().await.get(key) {
                        return Ok(value);
                    }

                    debug!(key, "cache miss, starting fetch");
                    let fetch = self.start_fetch(key.to_string(), fetcher(), ttl);
                    in_flight.insert(key.to_string(), fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    /// Spawns the producer and wraps its handle into a shareable future.
    ///
    /// Must be called with the registry lock held so the producer cannot
    /// unregister itself before it has been registered.
    fn start_fetch<Fut>(&self, key: String, fut: Fut, ttl: Duration) -> SharedFetch<T>
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let in_flight = Arc::clone(&self.in_flight);

        let handle = tokio::spawn(async move {
            let result = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Aborted(format!("fetch for '{}' panicked", key))),
            };

            if let Ok(value) = &result {
                store.lock().await.set(key.clone(), value.clone(), ttl);
            }
            in_flight.lock().await.remove(&key);

            result
        });

        async move {
            handle
                .await
                .unwrap_or_else(|err| Err(FetchError::Aborted(err.to_string())))
        }
        .boxed()
        .shared()
    }

    // == Cached ==
    /// Plain cache read: the value if present and fresh, counting a hit.
    pub async fn cached(&self, key: &str) -> Option<T> {
        self.store.lock().await.get(key)
    }

    // == Is Fresh ==
    /// Whether `key` holds a fresh value; does not count as a read.
    pub async fn is_fresh(&self, key: &str) -> bool {
        self.store.lock().await.peek_fresh(key)
    }

    // == Is In Flight ==
    /// Whether a fetch for `key` is currently running.
    pub async fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.lock().await.contains_key(key)
    }

    /// Number of fetches currently running.
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    // == Cache Administration ==
    /// Writes a value directly into the cache.
    pub async fn set(&self, key: &str, value: T, ttl: Duration) {
        self.store.lock().await.set(key, value, ttl);
    }

    /// Removes one key. Returns whether it was present.
    pub async fn delete(&self, key: &str) -> bool {
        self.store.lock().await.delete(key)
    }

    /// Removes every cached key containing `pattern`.
    pub async fn invalidate(&self, pattern: &str) -> usize {
        self.store.lock().await.invalidate(pattern)
    }

    /// Removes every cached entry.
    pub async fn clear(&self) -> usize {
        self.store.lock().await.clear()
    }

    /// Removes every expired entry.
    pub async fn sweep(&self) -> usize {
        self.store.lock().await.sweep()
    }

    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.store.lock().await.stats()
    }
}
