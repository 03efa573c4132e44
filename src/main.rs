//! Tiercache - tiered caching and rate limiting service
//!
//! Serves the cache, rate limiter and metrics over HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiercache::api::{create_router, AppState};
use tiercache::config::Config;
use tiercache::tasks::{spawn_local_cache_sweep, spawn_metrics_cleanup, spawn_store_cleanup};

/// Main entry point for the tiercache service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect the shared store (or start the embedded one)
/// 4. Start background sweep tasks
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiercache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tiercache service");

    let config = Config::from_env();
    info!(
        "Configuration loaded: local_max_entries={}, shared_ttl_factor={}, metrics_capacity={}, port={}",
        config.local_cache_max_entries,
        config.cache_shared_ttl_factor,
        config.metrics_capacity,
        config.server_port
    );
    if config.data_upstream_url.is_none() {
        warn!("DATA_UPSTREAM_URL not set, /data endpoints will answer 503");
    }

    let state = AppState::from_config(&config)?;

    let mut tasks = vec![
        spawn_local_cache_sweep(
            state.cache.local().clone(),
            Duration::from_secs(config.local_cache_sweep_interval),
        ),
        spawn_metrics_cleanup(state.tracker.clone()),
    ];
    if let Some(store) = &state.embedded_store {
        tasks.push(spawn_store_cleanup(
            store.clone(),
            Duration::from_secs(config.local_cache_sweep_interval),
        ));
    }
    info!("Started {} background tasks", tasks.len());

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tasks))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts background tasks.
async fn shutdown_signal(tasks: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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

    for task in &tasks {
        task.abort();
    }
    warn!("Aborted {} background tasks", tasks.len());
}
