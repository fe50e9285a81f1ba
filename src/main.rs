//! WorkQueue Engine - Request-to-queue-element service
//!
//! The Engine:
//! - Polls the workflow manager for approved requests
//! - Splits each request into queue elements using block and site data
//! - Persists elements and reclaims them once their workflow closes
//! - Serves a small status API

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use workqueue_engine::infrastructure::config::{AppConfig, StoreBackend};
use workqueue_engine::infrastructure::http;
use workqueue_engine::infrastructure::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workqueue_engine=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting WorkQueue Engine");

    // Load configuration
    let config = AppConfig::load()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  ReqMgr: {}", config.reqmgr_url);
    tracing::info!("  DBS: {}", config.dbs_url);
    tracing::info!("  PhEDEx: {}", config.phedex_url);
    tracing::info!(
        "  Workers: {}, queue size: {}",
        config.workers,
        config.queue_size
    );
    if config.store_backend == StoreBackend::Sqlite {
        tracing::info!("  Store: {}", config.sqlite_path);
    }

    // Initialize application state
    let port = config.server_port;
    let state = Arc::new(AppState::new(config).await?);
    tracing::info!("Application state initialized");

    // Start the intake/reclaim schedules
    let (stop_tx, stop_rx) = watch::channel(false);
    let dispatcher_task = {
        let dispatcher = state.dispatcher.clone();
        tokio::spawn(async move { dispatcher.run(stop_rx).await })
    };

    // Build the router
    let app = http::create_routes()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping dispatcher and workers...");
        }
    }

    let _ = stop_tx.send(true);
    if let Err(e) = dispatcher_task.await {
        tracing::error!("Dispatcher task failed: {}", e);
    }
    state.pool.shutdown().await;
    tracing::info!("WorkQueue Engine stopped");

    Ok(())
}
