//! Canopy Kernel
//!
//! HTTP server for the content tree management API.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use canopy_kernel::{AppState, Config, routes};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Canopy kernel");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(port = config.port, store = ?config.store, "Configuration loaded");

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    info!(
        content_types = state.content_types().list().len(),
        principals = state.principals().len(),
        "Content store ready"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = if config.scheduler_interval_secs > 0 {
        Some(state.scheduler().clone().spawn(
            Duration::from_secs(config.scheduler_interval_secs),
            state.metrics().clone(),
            shutdown_rx,
        ))
    } else {
        info!("Scheduled publishing disabled");
        None
    };

    let app = routes::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    shutdown_tx.send(true).ok();
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!(error = %e, "scheduler task ended abnormally");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
