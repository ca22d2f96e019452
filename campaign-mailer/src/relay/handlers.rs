//! Relay endpoint handlers.
//!
//! The relay owns the mail transport. It starts serving before the transport
//! is chosen; until then send endpoints answer 500 with status
//! `initializing`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OnceCell;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use super::bulk::{send_bulk as send_bulk_batches, DEFAULT_SENDER_NAME};
use super::templates;
use super::types::{
    BulkRequest, BulkResponse, BulkSummary, ContactFormRequest, EmailServiceHealth, HealthReport,
    MockEmailHealth, SmtpHealth, TestEmailRequest,
};
use crate::transport::{MailOptions, Mailer, SendInfo, TransportError, TransportStatus};
use crate::util::is_valid_email;
use crate::Config;

/// Attempts made by the test-email endpoints.
pub const TEST_EMAIL_ATTEMPTS: u32 = 3;

/// Per-attempt timeout of the test-email endpoints.
pub const TEST_EMAIL_TIMEOUT: Duration = Duration::from_secs(30);

const MOCK_SENDER: &str = "mock@example.com";

/// Shared relay state.
#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<Config>,
    mailer: Arc<OnceCell<Mailer>>,
    started_at: Instant,
}

impl RelayState {
    /// State without a transport; call [`RelayState::install`] once one is
    /// chosen.
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            mailer: Arc::new(OnceCell::new()),
            started_at: Instant::now(),
        }
    }

    pub fn with_mailer(config: Config, mailer: Mailer) -> Self {
        let state = Self::new(config);
        state.install(mailer);
        state
    }

    /// Install the transport. Later calls are ignored.
    pub fn install(&self, mailer: Mailer) {
        let status = mailer.initial_status();
        if self.mailer.set(mailer).is_err() {
            warn!("mailer_already_installed");
            return;
        }
        info!(status = %status, "email_service_initialized");
    }

    pub fn mailer(&self) -> Result<&Mailer, TransportError> {
        self.mailer
            .get()
            .ok_or(TransportError::NotReady(TransportStatus::Initializing))
    }

    /// Status recorded when the transport was installed.
    pub fn service_status(&self) -> TransportStatus {
        self.mailer
            .get()
            .map(Mailer::initial_status)
            .unwrap_or(TransportStatus::Initializing)
    }

    /// Address every relay message is sent from.
    pub fn sender_address(&self) -> String {
        self.config
            .smtp
            .sender()
            .unwrap_or(MOCK_SENDER)
            .to_string()
    }
}

/// All relay routes with request tracing and permissive CORS.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/send-bulk", post(send_bulk))
        .route("/api/test-email", get(test_email_get).post(test_email_post))
        .route("/api/send-contact", post(send_contact))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Responses
// =============================================================================

/// Error body shared by the send endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    pub timestamp: String,
}

impl FailureResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            status: None,
            error: None,
            error_code: None,
            attempts: None,
            timestamp: crate::util::format_iso(&crate::util::now()),
        }
    }

    fn with_error(mut self, e: &TransportError) -> Self {
        self.error = Some(e.to_string());
        self.error_code = e.code().map(str::to_string);
        self
    }

    fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Body that did not decode as the endpoint's JSON payload.
fn invalid_body(rejection: JsonRejection) -> Response {
    let status = rejection.status();
    let reason = rejection.body_text();
    warn!(status_code = status.as_u16(), error = %reason, "invalid_request_body");
    FailureResponse {
        error: Some(reason),
        ..FailureResponse::new("Invalid request body")
    }
    .into_response_with(status)
}

fn unavailable(state: &RelayState) -> Response {
    let status = state.service_status();
    warn!(status = %status, "email_service_unavailable");
    FailureResponse {
        status: Some(status.as_str()),
        ..FailureResponse::new("Email service not configured")
    }
    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
}

// =============================================================================
// Index and health
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub email_service: &'static str,
    pub email_ready: bool,
    pub endpoints: Vec<&'static str>,
    pub timestamp: String,
}

pub async fn index(State(state): State<RelayState>) -> Json<IndexResponse> {
    let status = state.service_status();
    Json(IndexResponse {
        message: "Bagga Bugs Email Backend",
        status: "running",
        email_service: status.as_str(),
        email_ready: status.is_usable(),
        endpoints: vec![
            "GET /api/health",
            "POST /api/send-bulk",
            "GET /api/test-email",
            "POST /api/test-email",
            "POST /api/send-contact",
        ],
        timestamp: crate::util::format_iso(&crate::util::now()),
    })
}

/// Health report. A live SMTP transport is re-verified on every call.
pub async fn health(State(state): State<RelayState>) -> Json<HealthReport> {
    let service_status = state.service_status();
    let mailer = state.mailer().ok();

    let live_status = match mailer {
        Some(m @ Mailer::Smtp(_)) => match m.verify().await {
            Ok(()) => TransportStatus::Ready,
            Err(e) => {
                error!(error = %e, "email_verification_failed");
                e.verify_status()
            }
        },
        Some(Mailer::Mock(_)) => TransportStatus::MockReady,
        None => TransportStatus::Initializing,
    };

    let mock_emails = match mailer.and_then(Mailer::as_mock) {
        Some(mock) => Some(MockEmailHealth {
            total_sent: mock.sent_count().await,
            last_sent: mock.last_sent_at().await,
        }),
        None => None,
    };

    let smtp = &state.config.smtp;
    let not_set = || "Not set".to_string();
    let active_port = match mailer {
        Some(Mailer::Smtp(s)) => Some(s.port()),
        _ => smtp.port,
    };
    let using_mock = mailer.is_some_and(Mailer::is_mock);

    Json(HealthReport {
        status: "running".to_string(),
        timestamp: crate::util::now(),
        email_service: EmailServiceHealth {
            status: live_status.as_str().to_string(),
            service_status: service_status.as_str().to_string(),
            ready: service_status.is_usable(),
            using_mock_email: using_mock,
        },
        smtp: SmtpHealth {
            host: smtp.host.clone(),
            port: active_port.map(|p| p.to_string()).unwrap_or_else(not_set),
            user: smtp.user.clone().unwrap_or_else(not_set),
            pass: if smtp.password.is_some() { "Set" } else { "Not set" }.to_string(),
            from_email: smtp.from_email.clone().unwrap_or_else(not_set),
            mock_mode: using_mock,
        },
        uptime: format!("{} seconds", state.started_at.elapsed().as_secs()),
        port: state.config.relay_port,
        mock_emails,
    })
}

// =============================================================================
// Bulk send
// =============================================================================

pub async fn send_bulk(
    State(state): State<RelayState>,
    payload: Result<Json<BulkRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return invalid_body(rejection),
    };
    let Ok(mailer) = state.mailer() else {
        return unavailable(&state);
    };

    if request.emails.is_empty() {
        return FailureResponse::new("Emails array is required and must not be empty")
            .into_response_with(StatusCode::BAD_REQUEST);
    }

    info!(count = request.emails.len(), "bulk_request_received");

    let results = send_bulk_batches(
        mailer,
        &state.sender_address(),
        &request.emails,
        state.config.bulk_concurrency,
        Duration::from_millis(state.config.bulk_batch_delay_ms),
    )
    .await;
    let summary = BulkSummary::of(&results);

    if summary.failed > 0 {
        let failed: Vec<&str> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.to.as_str())
            .collect();
        warn!(failed = ?failed, "bulk_recipients_failed");
    }

    (
        StatusCode::OK,
        Json(BulkResponse {
            success: true,
            message: format!(
                "Processed {} emails ({} sent, {} failed)",
                summary.total, summary.sent, summary.failed
            ),
            results,
            summary,
        }),
    )
        .into_response()
}

// =============================================================================
// Test email
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEmailResponse {
    pub success: bool,
    pub message: String,
    pub message_id: String,
    pub accepted: Vec<String>,
    pub to: String,
    pub attempt: u32,
    pub method: &'static str,
}

pub async fn test_email_get(State(state): State<RelayState>) -> Response {
    run_test_email(&state, None, "GET").await
}

pub async fn test_email_post(
    State(state): State<RelayState>,
    body: Option<Json<TestEmailRequest>>,
) -> Response {
    let recipient = body.and_then(|Json(req)| req.email).filter(|e| !e.trim().is_empty());
    run_test_email(&state, recipient, "POST").await
}

async fn run_test_email(state: &RelayState, recipient: Option<String>, method: &'static str) -> Response {
    let Ok(mailer) = state.mailer() else {
        return unavailable(state);
    };

    let from = state.sender_address();
    let to = recipient
        .or_else(|| state.config.smtp.user.clone())
        .unwrap_or_else(|| from.clone());
    let smtp = &state.config.smtp;
    let port = smtp.port.map(|p| p.to_string()).unwrap_or_default();
    let retry_delay = Duration::from_millis(state.config.test_email_retry_delay_ms);

    let mut attempt = 0;
    loop {
        attempt += 1;
        info!(to = %to, attempt = attempt, method = method, "test_email_attempt");

        let now = crate::util::now();
        let options = MailOptions {
            from_name: Some(format!("{DEFAULT_SENDER_NAME} Test")),
            from: from.clone(),
            to: to.clone(),
            reply_to: None,
            subject: format!("Test Email Success - {}", crate::util::us_short_date(&now)),
            html: templates::test_email(&smtp.host, &port, &from, &to, attempt, TEST_EMAIL_ATTEMPTS, &now),
            text: Some(format!(
                "Bagga Bugs test email sent successfully at {} (Attempt {}/{})",
                crate::util::format_iso(&now),
                attempt,
                TEST_EMAIL_ATTEMPTS
            )),
        };

        match send_with_timeout(mailer, &options, TEST_EMAIL_TIMEOUT).await {
            Ok(info) => {
                info!(to = %to, attempt = attempt, message_id = %info.message_id, "test_email_sent");
                return (
                    StatusCode::OK,
                    Json(TestEmailResponse {
                        success: true,
                        message: format!("Test email sent successfully on attempt {attempt}"),
                        message_id: info.message_id,
                        accepted: info.accepted,
                        to,
                        attempt,
                        method,
                    }),
                )
                    .into_response();
            }
            Err(e) if attempt < TEST_EMAIL_ATTEMPTS && e.is_retriable() => {
                warn!(to = %to, attempt = attempt, error = %e, "test_email_retrying");
                tokio::time::sleep(retry_delay).await;
            }
            Err(e) => {
                error!(to = %to, attempts = attempt, error = %e, "test_email_failed");
                return FailureResponse {
                    attempts: Some(attempt),
                    ..FailureResponse::new(format!("Test email failed after {attempt} attempts"))
                }
                .with_error(&e)
                .into_response_with(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }
}

async fn send_with_timeout(
    mailer: &Mailer,
    options: &MailOptions,
    timeout: Duration,
) -> Result<SendInfo, TransportError> {
    tokio::time::timeout(timeout, mailer.send(options))
        .await
        .map_err(|_| TransportError::Timeout {
            operation: "email send",
            timeout,
        })?
}

// =============================================================================
// Contact form
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFormResponse {
    pub success: bool,
    pub message: &'static str,
    pub message_id: String,
    pub accepted: Vec<String>,
    pub auto_reply_sent: bool,
}

pub async fn send_contact(
    State(state): State<RelayState>,
    payload: Result<Json<ContactFormRequest>, JsonRejection>,
) -> Response {
    let form = match payload {
        Ok(Json(form)) => form,
        Err(rejection) => return invalid_body(rejection),
    };
    let Ok(mailer) = state.mailer() else {
        return unavailable(&state);
    };

    if form.name.trim().is_empty() || form.email.trim().is_empty() || form.message.trim().is_empty() {
        return FailureResponse::new("Name, email, and message are required")
            .into_response_with(StatusCode::BAD_REQUEST);
    }
    if !is_valid_email(form.email.trim()) {
        return FailureResponse::new("Invalid email address")
            .into_response_with(StatusCode::BAD_REQUEST);
    }

    let inbox = state.sender_address();
    let subject = match form.subject.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => format!("Contact Form: {s}"),
        None => format!("Contact Form: Message from {}", form.name),
    };
    let html = form
        .html_content
        .clone()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| templates::contact_notification(&form, &crate::util::now()));

    let notification = MailOptions {
        from_name: Some(form.name.clone()),
        from: inbox.clone(),
        to: inbox.clone(),
        reply_to: Some(form.email.trim().to_string()),
        subject,
        html,
        text: Some(form.message.clone()),
    };

    let info = match mailer.send(&notification).await {
        Ok(info) => info,
        Err(e) => {
            error!(from = %form.email, error = %e, "contact_email_failed");
            return FailureResponse::new("Failed to send email")
                .with_error(&e)
                .into_response_with(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    info!(from = %form.email, message_id = %info.message_id, "contact_email_sent");

    let reply = MailOptions {
        from_name: Some(DEFAULT_SENDER_NAME.to_string()),
        from: inbox.clone(),
        to: form.email.trim().to_string(),
        reply_to: Some(inbox),
        subject: "We received your message".to_string(),
        html: templates::auto_reply(&form),
        text: None,
    };
    let auto_reply_sent = match mailer.send(&reply).await {
        Ok(_) => true,
        Err(e) => {
            warn!(to = %form.email, error = %e, "auto_reply_failed");
            false
        }
    };

    (
        StatusCode::OK,
        Json(ContactFormResponse {
            success: true,
            message: "Email sent successfully",
            message_id: info.message_id,
            accepted: info.accepted,
            auto_reply_sent,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::transport::MockMailer;

    fn config() -> Config {
        Config {
            bulk_batch_delay_ms: 0,
            test_email_retry_delay_ms: 0,
            ..Config::default()
        }
    }

    fn mock_state(mock: MockMailer) -> RelayState {
        RelayState::with_mailer(config(), Mailer::Mock(mock))
    }

    async fn call(state: RelayState, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = router(state).oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_reports_mock() {
        let state = mock_state(MockMailer::new(Duration::ZERO));
        let (status, body) = call(state, "GET", "/api/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["emailService"]["status"], "mock_ready");
        assert_eq!(body["emailService"]["usingMockEmail"], true);
        assert_eq!(body["smtp"]["pass"], "Not set");
        assert_eq!(body["mockEmails"]["totalSent"], 0);
    }

    #[tokio::test]
    async fn test_health_while_initializing() {
        let state = RelayState::new(config());
        let (status, body) = call(state.clone(), "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["emailService"]["status"], "initializing");
        assert_eq!(body["emailService"]["ready"], false);

        let (status, body) = call(
            state,
            "POST",
            "/api/send-bulk",
            Some(serde_json::json!({"emails": [{"to": "a@example.com"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "initializing");
    }

    #[tokio::test]
    async fn test_send_bulk_rejects_empty_list() {
        let state = mock_state(MockMailer::new(Duration::ZERO));
        let (status, body) = call(state, "POST", "/api/send-bulk", Some(serde_json::json!({"emails": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_send_bulk_reports_per_email_results() {
        let state = mock_state(MockMailer::new(Duration::ZERO).rejecting(&["bounce@example.com"]));
        let (status, body) = call(
            state,
            "POST",
            "/api/send-bulk",
            Some(serde_json::json!({"emails": [
                {"contactId": "1", "to": "ada@example.com", "subject": "Hi", "html": "<p>Hi</p>"},
                {"contactId": "2", "to": "bounce@example.com", "subject": "Hi", "html": "<p>Hi</p>"}
            ]})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["total"], 2);
        assert_eq!(body["summary"]["sent"], 1);
        assert_eq!(body["summary"]["failed"], 1);
        assert_eq!(body["results"][0]["contactId"], "1");
        assert_eq!(body["results"][0]["status"], "sent");
        assert_eq!(body["results"][1]["success"], false);
        assert_eq!(body["message"], "Processed 2 emails (1 sent, 1 failed)");
    }

    #[tokio::test]
    async fn test_test_email_get_uses_default_recipient() {
        let state = mock_state(MockMailer::new(Duration::ZERO));
        let (status, body) = call(state, "GET", "/api/test-email", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["to"], MOCK_SENDER);
        assert_eq!(body["attempt"], 1);
    }

    #[tokio::test]
    async fn test_test_email_non_retriable_failure_stops() {
        let state = mock_state(MockMailer::new(Duration::ZERO).rejecting(&["x@example.com"]));
        let (status, body) = call(
            state,
            "POST",
            "/api/test-email",
            Some(serde_json::json!({"email": "x@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["attempts"], 1);
        assert!(body["error"].as_str().unwrap().contains("x@example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_test_email_retries_timeouts_three_times() {
        let config = Config {
            test_email_retry_delay_ms: 3000,
            ..Config::default()
        };
        let slow = MockMailer::new(TEST_EMAIL_TIMEOUT + Duration::from_secs(1));
        let state = RelayState::with_mailer(config, Mailer::Mock(slow));

        let started = tokio::time::Instant::now();
        let (status, body) = call(state.clone(), "GET", "/api/test-email", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["attempts"], TEST_EMAIL_ATTEMPTS);
        assert_eq!(body["error"], "email send timed out after 30 seconds");
        // Three 30 s timeouts separated by two 3 s pauses.
        assert!(started.elapsed() >= Duration::from_secs(96));

        let mock = state.mailer().unwrap().as_mock().unwrap();
        assert_eq!(mock.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_bodies_get_json_errors() {
        let state = mock_state(MockMailer::new(Duration::ZERO));
        let cases = [
            ("/api/send-bulk", Some("application/json"), "{not json", StatusCode::BAD_REQUEST),
            ("/api/send-bulk", None, r#"{"emails": []}"#, StatusCode::UNSUPPORTED_MEDIA_TYPE),
            ("/api/send-contact", Some("application/json"), r#"{"name": 42}"#, StatusCode::UNPROCESSABLE_ENTITY),
        ];

        for (uri, content_type, raw, expected) in cases {
            let mut request = Request::builder().method("POST").uri(uri);
            if let Some(content_type) = content_type {
                request = request.header("content-type", content_type);
            }
            let response = router(state.clone())
                .oneshot(request.body(Body::from(raw)).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "{uri} {raw}");

            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["success"], false);
            assert_eq!(body["message"], "Invalid request body");
            assert!(body["timestamp"].is_string());
        }
    }

    #[tokio::test]
    async fn test_send_contact_validates_input() {
        let state = mock_state(MockMailer::new(Duration::ZERO));
        let (status, _) = call(
            state.clone(),
            "POST",
            "/api/send-contact",
            Some(serde_json::json!({"name": "Ada", "message": "Hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            state,
            "POST",
            "/api/send-contact",
            Some(serde_json::json!({"name": "Ada", "email": "not-an-email", "message": "Hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid email address");
    }

    #[tokio::test]
    async fn test_send_contact_swallows_auto_reply_failure() {
        let state = mock_state(MockMailer::new(Duration::ZERO).rejecting(&["ada@example.com"]));
        let (status, body) = call(
            state.clone(),
            "POST",
            "/api/send-contact",
            Some(serde_json::json!({"name": "Ada", "email": "ada@example.com", "message": "Hello\nthere"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["autoReplySent"], false);

        let sent = state.mailer().unwrap().as_mock().unwrap().sent_emails().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, MOCK_SENDER);
        assert_eq!(sent[0].subject, "Contact Form: Message from Ada");
    }
}
