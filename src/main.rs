//! Flight Cache - an in-process request cache served as a read-through proxy
//!
//! Caches origin responses with TTL and least-used eviction, coalesces
//! concurrent misses, bounds origin concurrency and warms keys in the background.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flight_cache::api::{create_router, AppState};
use flight_cache::{spawn_maintenance_task, Config, HttpOrigin};

/// Main entry point for the Flight Cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the origin client and the request cache
/// 4. Start background maintenance task
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flight_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Flight Cache");

    // Load configuration from environment variables
    let config = Config::from_env();
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    info!(
        "Configuration loaded: max_entries={}, max_concurrent={}, default_ttl={}ms, port={}, origin={}",
        config.max_entries,
        config.max_concurrent,
        config.default_ttl_ms,
        config.server_port,
        config.origin_url
    );

    let origin = HttpOrigin::new(config.origin_url.clone()).context("failed to build origin client")?;
    let state = AppState::from_config(&config, Arc::new(origin));

    // Start background maintenance task
    let maintenance_handle = spawn_maintenance_task(state.cache.clone(), config.sweep_interval());
    info!("Background maintenance task started");

    let cache = state.cache.clone();
    let app = create_router(state);

    // Bind to configured port
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(maintenance_handle))
        .await
        .context("server error")?;

    cache.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the maintenance task and allows graceful shutdown.
async fn shutdown_signal(maintenance_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Abort the maintenance task
    maintenance_handle.abort();
    warn!("Maintenance task aborted");
}
