//! Request Cache Service
//!
//! The handle the rest of an application talks to. It wires the
//! single-flight coordinator, the worker pool, the retry wrapper and the
//! preloader together and is passed explicitly to whoever needs it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::CacheStats;
use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::flight::SingleFlight;
use crate::pool::{PoolStats, WorkerPool};
use crate::preload::{PreloadStats, Preloader};
use crate::retry::{with_retry, RetryPolicy};

// == Request Cache ==
/// Cloneable handle to one cache/pool/preloader stack.
pub struct RequestCache<T> {
    flight: Arc<SingleFlight<T>>,
    pool: Arc<WorkerPool>,
    preloader: Arc<Preloader<T>>,
    retry: RetryPolicy,
}

impl<T> Clone for RequestCache<T> {
    fn clone(&self) -> Self {
        Self {
            flight: Arc::clone(&self.flight),
            pool: Arc::clone(&self.pool),
            preloader: Arc::clone(&self.preloader),
            retry: self.retry,
        }
    }
}

impl<T> RequestCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Builds a new stack from configuration.
    pub fn new(config: &Config) -> Self {
        let flight = Arc::new(SingleFlight::new(config.max_entries));
        let pool = Arc::new(WorkerPool::new(config.max_concurrent));
        let preloader = Arc::new(Preloader::new(
            Arc::clone(&flight),
            Arc::clone(&pool),
            config.preload_active_threshold,
            config.default_ttl(),
        ));

        info!(
            max_entries = config.max_entries,
            max_concurrent = config.max_concurrent,
            "request cache initialized"
        );

        Self {
            flight,
            pool,
            preloader,
            retry: config.retry,
        }
    }

    // == Get Or Fetch ==
    /// Single-flight cached fetch, without pool or retry.
    ///
    /// Fails with [`FetchError::PoolClosed`] once the cache is closed.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetcher: F, ttl: Duration) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if self.is_closed() {
            return Err(FetchError::PoolClosed);
        }
        self.flight.get_or_fetch(key, fetcher, ttl).await
    }

    // == Fetch ==
    /// The standard path for cache-backed remote fetches, using the
    /// configured retry policy.
    pub async fn fetch<F, Fut>(&self, key: &str, fetcher: F, ttl: Duration) -> Result<T>
    where
        F: Fn() -> Fut + Sync,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.fetch_with_policy(key, fetcher, ttl, &self.retry).await
    }

    /// Like [`fetch`](Self::fetch) with call-site retry parameters.
    ///
    /// A fresh cached value is returned without touching the pool. Otherwise
    /// each attempt waits for a pool slot and then joins or starts the
    /// single-flight fetch for `key`.
    pub async fn fetch_with_policy<F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        ttl: Duration,
        policy: &RetryPolicy,
    ) -> Result<T>
    where
        F: Fn() -> Fut + Sync,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if self.is_closed() {
            return Err(FetchError::PoolClosed);
        }
        if let Some(value) = self.flight.cached(key).await {
            return Ok(value);
        }

        let flight = &self.flight;
        let pool = &self.pool;
        let fetcher = &fetcher;

        with_retry(policy, move || {
            pool.execute(move || flight.get_or_fetch(key, fetcher, ttl))
        })
        .await
    }

    // == Cache Administration ==
    /// Plain cache read.
    pub async fn get(&self, key: &str) -> Option<T> {
        self.flight.cached(key).await
    }

    /// Writes a value directly into the cache.
    pub async fn set(&self, key: &str, value: T, ttl: Duration) {
        self.flight.set(key, value, ttl).await
    }

    /// Removes one key.
    pub async fn delete(&self, key: &str) -> bool {
        self.flight.delete(key).await
    }

    /// Removes every cached key containing `pattern`.
    pub async fn invalidate(&self, pattern: &str) -> usize {
        let removed = self.flight.invalidate(pattern).await;
        info!(pattern, removed, "cache invalidated");
        removed
    }

    /// Removes every cached entry.
    pub async fn clear(&self) -> usize {
        self.flight.clear().await
    }

    /// Removes expired entries.
    pub async fn sweep(&self) -> usize {
        self.flight.sweep().await
    }

    /// Cache statistics.
    pub async fn stats(&self) -> CacheStats {
        self.flight.stats().await
    }

    // == Pool ==
    /// Worker pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    // == Preloading ==
    /// Schedules a background warm-up of `key`. Returns false when the key
    /// is already fresh, already pending, or the cache is closed.
    pub async fn schedule<F, Fut>(&self, key: &str, fetcher: F, priority: i32) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.preloader.schedule(key, fetcher, priority).await
    }

    /// Resumes preloading if requests are pending and the pool has headroom.
    pub fn kick_preloader(&self) {
        self.preloader.kick();
    }

    /// Preloader statistics.
    pub async fn preload_stats(&self) -> PreloadStats {
        self.preloader.stats().await
    }

    // == Close ==
    /// Shuts the stack down: waiting pool callers fail with `PoolClosed`,
    /// pending preloads are dropped and the cache is emptied. Afterwards
    /// fetches fail with `PoolClosed` and schedules are rejected.
    pub async fn close(&self) {
        let dropped = self.preloader.close().await;
        self.pool.close();
        let cleared = self.flight.clear().await;
        info!(dropped, cleared, "request cache closed");
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.preloader.is_closed()
    }
}
