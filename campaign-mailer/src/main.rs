//! Campaign Dashboard - contact management, campaign sends and open tracking.
//!
//! Serves the dashboard page and its JSON API from a flat-file store and
//! hands every send to the relay service.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use campaign::{shutdown_signal, web, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("dashboard_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        data_dir = %config.data_dir.display(),
        backend_url = %config.backend_url,
        public_base_url = %config.public_base_url,
        "config_loaded"
    );

    let state = AppState::new(config.clone());

    match state.relay.health().await {
        Ok(health) => info!(
            email_service = %health.email_service.status,
            "relay_reachable"
        ),
        Err(e) => warn!(error = %e, "relay_unreachable_at_startup"),
    }

    let app = web::router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "dashboard_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal("dashboard"))
        .await
        .context("Server error")?;

    info!("dashboard_shutdown_complete");

    Ok(())
}
