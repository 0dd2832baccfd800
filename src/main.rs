//! flowguard server
//!
//! Receives agent telemetry on `/api/data`, runs detection and streams
//! metrics, throughput and alerts to dashboards over `/ws`.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flowguard::constants::{APP_NAME, APP_VERSION, DEFAULT_LOG_FILTER};
use flowguard::logic::detection::DetectionEngine;
use flowguard::logic::flow::spawn_sweeper;
use flowguard::{create_router, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize logging
    init_tracing(&config);

    tracing::info!("{} v{} starting ({})...", APP_NAME, APP_VERSION, config.environment);

    let engine = DetectionEngine::load(&config.detection());
    tracing::info!("Detection engine state: {}", engine.state());

    // Build application state
    let state = AppState::new(config.clone(), engine);
    let bus = Arc::clone(&state.bus);

    // Background flow eviction
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = spawn_sweeper(Arc::clone(&state.flows), config.flow_sweep_interval, shutdown_rx);

    // Start server
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;
    tracing::info!("🚀 Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Ends open streams so the drain can finish
            bus.close();
        })
        .await
        .context("server error")?;

    shutdown_tx.send_replace(true);
    if let Err(e) = sweeper.await {
        tracing::warn!("Flow sweeper ended abnormally: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
