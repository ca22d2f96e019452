//! Dashboard server: the JSON API behind the campaign dashboard page and the
//! open-tracking pixel.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /                        dashboard page
//! GET  /api/health              liveness
//! GET  /api/campaign            current template
//! PUT  /api/campaign            partial template update
//! POST /api/campaign/send       send to every pending contact
//! GET  /api/contacts            contact list
//! POST /api/contacts            add one contact
//! POST /api/contacts/bulk       add many contacts
//! POST /api/contacts/delete     delete {ids}
//! POST /api/contacts/clean      normalize {ids}
//! GET  /api/settings            sender settings
//! PUT  /api/settings            replace settings
//! POST /api/settings/reset      restore default settings
//! GET  /api/analytics           status counters
//! GET  /api/emails              send records
//! GET  /api/tracking/stats      open statistics
//! POST /api/tracking/test       simulate an open
//! GET  /api/tracking/debug      pixel diagnostics
//! GET  /api/track/:contact_id   tracking pixel
//! GET  /api/backend/health      relay connectivity
//! POST /api/send-email          one-off send
//! GET  /api/storage/stats       store statistics
//! GET  /api/export              full snapshot
//! POST /api/import              load a snapshot
//! POST /api/backup              write a backup file
//! POST /api/restore             restore {file}
//! POST /api/data/clear          wipe contacts and records
//! ```

pub mod data;
pub mod error;
pub mod handlers;
pub mod tracking;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::relay::RelayClient;
use crate::store::{Campaign, Store};
use crate::Config;

pub use error::ApiError;
pub use handlers::{health, HealthResponse};
pub use tracking::TRACKING_PIXEL;

/// Shared state for dashboard handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    /// The campaign template lives in memory and resets on restart.
    pub campaign: Arc<RwLock<Campaign>>,
    pub relay: RelayClient,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = Store::new(&config.data_dir);
        let relay = RelayClient::new(
            config.backend_url.clone(),
            Duration::from_millis(config.health_timeout_ms),
            Duration::from_millis(config.relay_timeout_ms),
        );
        Self {
            config: Arc::new(config),
            store,
            campaign: Arc::new(RwLock::new(Campaign::default())),
            relay,
        }
    }
}

/// Build the dashboard router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::dashboard_page))
        .route("/api/health", get(handlers::health))
        // Campaign
        .route(
            "/api/campaign",
            get(handlers::get_campaign).put(handlers::update_campaign),
        )
        .route("/api/campaign/send", post(handlers::send_campaign))
        // Contacts
        .route(
            "/api/contacts",
            get(handlers::list_contacts).post(handlers::add_contact),
        )
        .route("/api/contacts/bulk", post(handlers::add_contacts_bulk))
        .route("/api/contacts/delete", post(handlers::delete_contacts))
        .route("/api/contacts/clean", post(handlers::clean_contacts))
        // Settings
        .route(
            "/api/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route("/api/settings/reset", post(handlers::reset_settings))
        // Reporting
        .route("/api/analytics", get(handlers::analytics))
        .route("/api/emails", get(handlers::list_emails))
        // Tracking
        .route("/api/tracking/stats", get(tracking::tracking_stats))
        .route("/api/tracking/test", post(tracking::tracking_test))
        .route("/api/tracking/debug", get(tracking::tracking_debug))
        .route("/api/track/:contact_id", get(tracking::track_open))
        // Relay
        .route("/api/backend/health", get(handlers::backend_health))
        .route("/api/send-email", post(handlers::send_email))
        // Data management
        .route("/api/storage/stats", get(data::storage_stats))
        .route("/api/export", get(data::export_data))
        .route("/api/import", post(data::import_data))
        .route("/api/backup", post(data::create_backup))
        .route("/api/restore", post(data::restore_backup))
        .route("/api/data/clear", post(data::clear_data))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::{router, AppState};
    use crate::Config;

    /// State over a fresh data directory. The relay points at a closed port
    /// unless `state_with_relay` is used.
    pub(crate) fn test_state() -> (TempDir, AppState) {
        state_with_relay("http://127.0.0.1:1".to_string())
    }

    pub(crate) fn state_with_relay(backend_url: String) -> (TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            backend_url,
            health_timeout_ms: 2_000,
            relay_timeout_ms: 5_000,
            ..Config::default()
        };
        (dir, AppState::new(config))
    }

    /// Issue a JSON request and decode the JSON response.
    pub(crate) async fn call(
        state: AppState,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let method = Method::from_bytes(method.as_bytes()).unwrap();
        let request = match body {
            Some(body) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };

        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Send a raw body, optionally without a content type.
    pub(crate) async fn send_raw(
        state: AppState,
        method: &str,
        uri: &str,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(Method::from_bytes(method.as_bytes()).unwrap())
            .uri(uri);
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }
        let request = request.body(Body::from(body.to_string())).unwrap();

        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub(crate) async fn get_raw(state: AppState, uri: &str) -> Response {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        router(state).oneshot(request).await.unwrap()
    }
}
