//! Priority Preloader
//!
//! Background cache warming. Requests are kept in descending priority order
//! and drained only while the foreground pool is nearly idle.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::flight::SingleFlight;
use crate::pool::WorkerPool;

/// Type-erased one-shot fetcher.
type Fetcher<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T>> + Send>;

/// Active pool tasks at or above which preloading pauses.
pub const DEFAULT_ACTIVE_THRESHOLD: usize = 2;

// == Preload Request ==
/// A pending warm-up of one key.
pub struct PreloadRequest<T> {
    /// Cache key to warm
    pub key: String,
    /// Higher runs first
    pub priority: i32,
    fetcher: Fetcher<T>,
}

impl<T> std::fmt::Debug for PreloadRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadRequest")
            .field("key", &self.key)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

// == Preload Stats ==
/// Counters for the preloader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreloadStats {
    /// Requests waiting to be dispatched
    pub pending: usize,
    /// Requests that reached the fetch path
    pub dispatched: u64,
    /// Dispatched requests whose fetch failed
    pub failed: u64,
    /// Requests dropped because the key was already fresh at dispatch time
    pub skipped: u64,
}

// == Preloader ==
/// Low-priority producer feeding the single-flight coordinator.
///
/// Preloads go straight to the coordinator and never occupy a pool slot, so
/// background warming cannot starve foreground requests. The pool is only
/// read to decide whether to keep draining.
pub struct Preloader<T> {
    flight: Arc<SingleFlight<T>>,
    pool: Arc<WorkerPool>,
    pending: Mutex<VecDeque<PreloadRequest<T>>>,
    draining: AtomicBool,
    closed: AtomicBool,
    active_threshold: usize,
    ttl: Duration,
    dispatched: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl<T> Preloader<T>
where
    T: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a preloader caching warmed values for `ttl`.
    pub fn new(
        flight: Arc<SingleFlight<T>>,
        pool: Arc<WorkerPool>,
        active_threshold: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            flight,
            pool,
            pending: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            active_threshold,
            ttl,
            dispatched: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    // == Schedule ==
    /// Queues a background fetch of `key`.
    ///
    /// Returns false, doing nothing, when `key` is already fresh in the cache,
    /// already pending, or the preloader is closed. Equal priorities keep
    /// their arrival order.
    pub async fn schedule<F, Fut>(self: &Arc<Self>, key: &str, fetcher: F, priority: i32) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if self.is_closed() {
            debug!(key, "preload rejected, preloader closed");
            return false;
        }

        if self.flight.is_fresh(key).await {
            debug!(key, "preload skipped, already cached");
            return false;
        }

        {
            let mut pending = self.pending.lock().await;
            // `close` clears under this lock, so nothing slips in behind it
            if self.is_closed() {
                return false;
            }
            if pending.iter().any(|request| request.key == key) {
                debug!(key, "preload skipped, already pending");
                return false;
            }

            let position = pending.partition_point(|request| request.priority >= priority);
            pending.insert(
                position,
                PreloadRequest {
                    key: key.to_string(),
                    priority,
                    fetcher: Box::new(move || fetcher().boxed()),
                },
            );
        }

        self.kick();
        true
    }

    // == Kick ==
    /// Starts a drain task unless one is already running.
    pub fn kick(self: &Arc<Self>) {
        if self.is_closed() || self.draining.swap(true, Ordering::SeqCst) {
            return;
        }
        tokio::spawn(Arc::clone(self).drain());
    }

    /// Dispatches pending requests one at a time while the pool has headroom.
    async fn drain(self: Arc<Self>) {
        loop {
            while let Some(request) = self.next_request().await {
                self.dispatch(request).await;
            }

            self.draining.store(false, Ordering::SeqCst);

            // A request scheduled after the last pop saw `draining == true`
            // and did not start a task; pick it up here.
            if !self.can_dispatch().await || self.draining.swap(true, Ordering::SeqCst) {
                return;
            }
        }
    }

    fn has_headroom(&self) -> bool {
        self.pool.stats().active < self.active_threshold
    }

    async fn can_dispatch(&self) -> bool {
        !self.is_closed() && self.has_headroom() && !self.pending.lock().await.is_empty()
    }

    async fn next_request(&self) -> Option<PreloadRequest<T>> {
        if self.is_closed() || !self.has_headroom() {
            return None;
        }
        self.pending.lock().await.pop_front()
    }

    async fn dispatch(&self, request: PreloadRequest<T>) {
        let PreloadRequest { key, fetcher, .. } = request;

        if self.flight.is_fresh(&key).await {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "preload dropped, cached since scheduling");
            return;
        }

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "preloading");
        if let Err(err) = self.flight.get_or_fetch(&key, fetcher, self.ttl).await {
            self.failed.fetch_add(1, Ordering::Relaxed);
            warn!(key = %key, error = %err, "preload failed");
        }
    }

    // == Pending ==
    /// Number of requests waiting to be dispatched.
    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Keys waiting to be dispatched, in dispatch order.
    pub async fn pending_keys(&self) -> Vec<String> {
        self.pending
            .lock()
            .await
            .iter()
            .map(|request| request.key.clone())
            .collect()
    }

    /// Drops every pending request, returning how many were dropped.
    pub async fn clear(&self) -> usize {
        let mut pending = self.pending.lock().await;
        let count = pending.len();
        pending.clear();
        count
    }

    // == Close ==
    /// Stops the preloader for good: pending requests are dropped, later
    /// schedules are rejected and no new drain starts. A dispatch already in
    /// progress finishes. Returns how many pending requests were dropped.
    pub async fn close(&self) -> usize {
        let mut pending = self.pending.lock().await;
        self.closed.store(true, Ordering::SeqCst);
        let count = pending.len();
        pending.clear();
        count
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether a drain task is running.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    // == Stats ==
    /// Returns current preloader statistics.
    pub async fn stats(&self) -> PreloadStats {
        PreloadStats {
            pending: self.pending_len().await,
            dispatched: self.dispatched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    const TTL: Duration = Duration::from_secs(60);

    fn preloader(pool: Arc<WorkerPool>) -> Arc<Preloader<String>> {
        let flight = Arc::new(SingleFlight::new(100));
        Arc::new(Preloader::new(flight, pool, DEFAULT_ACTIVE_THRESHOLD, TTL))
    }

    /// Occupies `n` pool slots until the returned senders are dropped or fired.
    async fn occupy(pool: &Arc<WorkerPool>, n: usize) -> Vec<oneshot::Sender<()>> {
        let mut releases = Vec::new();
        for _ in 0..n {
            let (tx, rx) = oneshot::channel::<()>();
            releases.push(tx);
            let pool = Arc::clone(pool);
            tokio::spawn(async move {
                pool.execute(|| async move {
                    let _ = rx.await;
                    Ok(())
                })
                .await
            });
        }
        while pool.stats().active < n {
            tokio::task::yield_now().await;
        }
        releases
    }

    async fn wait_idle(preloader: &Preloader<String>) {
        while preloader.is_draining() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_schedule_warms_cache() {
        let preloader = preloader(Arc::new(WorkerPool::new(4)));

        assert!(
            preloader
                .schedule("packs", || async { Ok("warm".to_string()) }, 1)
                .await
        );
        wait_idle(&preloader).await;

        assert_eq!(preloader.flight.cached("packs").await, Some("warm".to_string()));
        assert_eq!(preloader.stats().await.dispatched, 1);
    }

    #[tokio::test]
    async fn test_duplicate_schedule_dispatches_once() {
        let pool = Arc::new(WorkerPool::new(4));
        let preloader = preloader(Arc::clone(&pool));
        let calls = Arc::new(AtomicUsize::new(0));

        // Hold the pool busy so both schedules land in the pending list
        let releases = occupy(&pool, 2).await;

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            preloader
                .schedule(
                    "k",
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok("v".to_string())
                    },
                    0,
                )
                .await;
        }
        wait_idle(&preloader).await;
        assert_eq!(preloader.pending_len().await, 1);

        drop(releases);
        while pool.stats().active > 0 {
            tokio::task::yield_now().await;
        }
        preloader.kick();
        wait_idle(&preloader).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(preloader.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_fresh_key_is_not_scheduled() {
        let preloader = preloader(Arc::new(WorkerPool::new(4)));
        preloader.flight.set("k", "cached".to_string(), TTL).await;

        let scheduled = preloader
            .schedule("k", || async { Ok("fresh".to_string()) }, 5)
            .await;

        assert!(!scheduled);
        assert_eq!(preloader.pending_len().await, 0);
        assert_eq!(preloader.flight.cached("k").await, Some("cached".to_string()));
    }

    #[tokio::test]
    async fn test_priority_order_is_stable() {
        let pool = Arc::new(WorkerPool::new(4));
        let preloader = preloader(Arc::clone(&pool));
        let _releases = occupy(&pool, 2).await;

        for (key, priority) in [("a", 1), ("b", 5), ("c", 1), ("d", 5), ("e", 3)] {
            preloader
                .schedule(key, || async { Ok(String::new()) }, priority)
                .await;
        }
        wait_idle(&preloader).await;

        assert_eq!(preloader.pending_keys().await, vec!["b", "d", "e", "a", "c"]);
    }

    #[tokio::test]
    async fn test_busy_pool_holds_back_preloads() {
        let pool = Arc::new(WorkerPool::new(4));
        let preloader = preloader(Arc::clone(&pool));
        let releases = occupy(&pool, 2).await;

        preloader
            .schedule("k", || async { Ok("v".to_string()) }, 0)
            .await;
        wait_idle(&preloader).await;
        assert_eq!(preloader.pending_len().await, 1);
        assert_eq!(preloader.stats().await.dispatched, 0);

        drop(releases);
        while pool.stats().active > 0 {
            tokio::task::yield_now().await;
        }
        preloader.kick();
        wait_idle(&preloader).await;
        assert_eq!(preloader.flight.cached("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_failed_preload_is_swallowed() {
        let preloader = preloader(Arc::new(WorkerPool::new(4)));

        preloader
            .schedule("bad", || async { Err(FetchError::origin("nope")) }, 0)
            .await;
        preloader
            .schedule("good", || async { Ok("ok".to_string()) }, 0)
            .await;
        wait_idle(&preloader).await;

        let stats = preloader.stats().await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(preloader.flight.cached("bad").await, None);
        assert_eq!(preloader.flight.cached("good").await, Some("ok".to_string()));
    }

    #[tokio::test]
    async fn test_clear_drops_pending() {
        let pool = Arc::new(WorkerPool::new(4));
        let preloader = preloader(Arc::clone(&pool));
        let _releases = occupy(&pool, 2).await;

        preloader
            .schedule("x", || async { Ok(String::new()) }, 0)
            .await;
        wait_idle(&preloader).await;

        assert_eq!(preloader.clear().await, 1);
        assert_eq!(preloader.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_closed_preloader_refuses_work() {
        let pool = Arc::new(WorkerPool::new(4));
        let preloader = preloader(Arc::clone(&pool));
        let releases = occupy(&pool, 2).await;
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        preloader
            .schedule(
                "held",
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(String::new())
                },
                0,
            )
            .await;
        wait_idle(&preloader).await;

        assert_eq!(preloader.close().await, 1);
        assert!(preloader.is_closed());

        let counter = Arc::clone(&calls);
        let scheduled = preloader
            .schedule(
                "late",
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(String::new())
                },
                0,
            )
            .await;
        assert!(!scheduled);

        // Headroom returns, but a kick no longer starts a drain
        drop(releases);
        while pool.stats().active > 0 {
            tokio::task::yield_now().await;
        }
        preloader.kick();
        assert!(!preloader.is_draining());
        tokio::task::yield_now().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(preloader.stats().await.pending, 0);
        assert_eq!(preloader.flight.stats().await.size, 0);
    }
}
