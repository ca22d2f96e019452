//! Graceful shutdown on SIGINT or SIGTERM, shared by both binaries.

use tokio::signal;
use tracing::info;

/// Create a future that completes when a shutdown signal is received.
///
/// `service` names the binary in the shutdown log event.
pub async fn shutdown_signal(service: &'static str) {
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
        _ = ctrl_c => info!(service = service, "Received SIGINT"),
        _ = terminate => info!(service = service, "Received SIGTERM"),
    }

    info!(service = service, "shutting_down");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal_waits_for_a_signal() {
        let waited = tokio::time::timeout(Duration::from_millis(50), shutdown_signal("test")).await;
        assert!(waited.is_err());
    }
}
