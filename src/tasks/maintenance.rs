//! Cache Maintenance Task
//!
//! Background task that periodically sweeps expired cache entries and
//! resumes preloading that was held back by a busy pool.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::service::RequestCache;

/// Spawns a background task that sweeps `cache` every `interval`.
///
/// Each tick also kicks the preloader, so pending warm-ups do not wait for
/// the next `schedule` call once the pool frees up.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = RequestCache::<String>::new(&Config::default());
/// let handle = spawn_maintenance_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_maintenance_task<T>(cache: RequestCache<T>, interval: Duration) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            "Starting cache maintenance task with interval of {}ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.sweep().await;
            if removed > 0 {
                info!("Cache sweep: removed {} expired entries", removed);
            } else {
                debug!("Cache sweep: no expired entries found");
            }

            cache.kick_preloader();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test(start_paused = true)]
    async fn test_maintenance_sweeps_expired_entries() {
        let cache = RequestCache::<String>::new(&Config::default());
        cache
            .set("expire_soon", "value".to_string(), Duration::from_millis(500))
            .await;
        cache
            .set("long_lived", "value".to_string(), Duration::from_secs(3600))
            .await;

        let handle = spawn_maintenance_task(cache.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;

        let stats = cache.stats().await;
        assert_eq!(stats.size, 1, "Expired entry should have been swept");
        assert_eq!(stats.expirations, 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_maintenance_resumes_held_back_preloads() {
        let config = Config {
            max_concurrent: 4,
            preload_active_threshold: 2,
            ..Config::default()
        };
        let cache = RequestCache::<String>::new(&config);

        // Two slow foreground fetches keep the pool at the preload threshold
        let mut releases = Vec::new();
        for key in ["slow_1", "slow_2"] {
            let (tx, rx) = tokio::sync::oneshot::channel::<()>();
            let rx = std::sync::Mutex::new(Some(rx));
            releases.push(tx);
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .fetch(
                        key,
                        move || {
                            let rx = rx.lock().unwrap().take();
                            async move {
                                if let Some(rx) = rx {
                                    let _ = rx.await;
                                }
                                Ok("slow".to_string())
                            }
                        },
                        Duration::from_secs(60),
                    )
                    .await
            });
        }
        while cache.pool_stats().active < 2 {
            tokio::task::yield_now().await;
        }

        cache
            .schedule("k", || async { Ok("warm".to_string()) }, 0)
            .await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.preload_stats().await.pending, 1);

        for tx in releases {
            let _ = tx.send(());
        }
        while cache.pool_stats().active > 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.preload_stats().await.pending, 1);

        let handle = spawn_maintenance_task(cache.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.preload_stats().await.pending, 0);
        assert_eq!(cache.get("k").await, Some("warm".to_string()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_maintenance_task_can_be_aborted() {
        let cache = RequestCache::<String>::new(&Config::default());

        let handle = spawn_maintenance_task(cache, Duration::from_secs(1));

        // Abort immediately
        handle.abort();

        // Wait a bit and verify task is finished
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
