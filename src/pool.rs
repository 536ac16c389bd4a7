//! Bounded Worker Pool
//!
//! Caps the number of concurrently executing tasks. Excess tasks wait for a
//! slot in FIFO order; saturation is backpressure, never an error.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::{Semaphore, TryAcquireError};
use tracing::debug;

use crate::error::{FetchError, Result};

// == Pool Stats ==
/// Read-only snapshot of the pool's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Tasks currently running
    pub active: usize,
    /// Tasks waiting for a slot
    pub queued: usize,
    /// Slot count
    pub max_concurrent: usize,
}

// == Worker Pool ==
/// Concurrency limiter for async tasks.
///
/// Slots are handed out by a fair semaphore, so waiting tasks start in the
/// order they were submitted.
#[derive(Debug)]
pub struct WorkerPool {
    slots: Semaphore,
    max_concurrent: usize,
    active: AtomicUsize,
    queued: AtomicUsize,
}

impl WorkerPool {
    // == Constructor ==
    /// Creates a pool running at most `max_concurrent` tasks (at least one).
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            slots: Semaphore::new(max_concurrent),
            max_concurrent,
            active: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
        }
    }

    // == Execute ==
    /// Runs `task` once a slot is free and returns its result.
    ///
    /// `task` is not called until the slot is held. The slot is released when
    /// the task settles or when the caller drops this future.
    pub async fn execute<T, F, Fut>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _permit = match self.slots.try_acquire() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(FetchError::PoolClosed),
            Err(TryAcquireError::NoPermits) => {
                let _waiting = CounterGuard::enter(&self.queued);
                self.slots
                    .acquire()
                    .await
                    .map_err(|_| FetchError::PoolClosed)?
            }
        };

        // Declared after the permit so it is released first on drop.
        let _running = CounterGuard::enter(&self.active);
        task().await
    }

    // == Stats ==
    /// Returns current pool statistics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active: self.active.load(Ordering::SeqCst),
            queued: self.queued.load(Ordering::SeqCst),
            max_concurrent: self.max_concurrent,
        }
    }

    // == Close ==
    /// Stops handing out slots. Running tasks finish; waiting and future
    /// callers get [`FetchError::PoolClosed`].
    pub fn close(&self) {
        debug!("closing worker pool");
        self.slots.close();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }
}

/// Increments a counter for as long as the guard lives.
struct CounterGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> CounterGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
