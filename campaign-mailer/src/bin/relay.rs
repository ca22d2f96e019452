//! Campaign Relay - HTTP front for the outbound mail transport.
//!
//! Starts serving immediately and picks the transport in the background:
//! SMTP when credentials are configured and a connection verifies, the mock
//! transport otherwise.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use campaign::{init_mailer, relay, shutdown_signal, Config, RelayState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("relay_starting");

    let config = Config::from_env();
    info!(
        port = config.relay_port,
        smtp_host = %config.smtp.host,
        smtp_port = ?config.smtp.port,
        smtp_credentials_configured = config.smtp.has_credentials(),
        force_mock_email = config.force_mock_email,
        bulk_concurrency = config.bulk_concurrency,
        "config_loaded"
    );

    let state = RelayState::new(config.clone());

    // Transport selection can take several SMTP timeouts; serve meanwhile.
    let init_state = state.clone();
    tokio::spawn(async move {
        let mailer = init_mailer(&init_state.config).await;
        init_state.install(mailer);
    });

    let app = relay::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.relay_port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "relay_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal("relay"))
        .await
        .context("Server error")?;

    info!("relay_shutdown_complete");

    Ok(())
}
