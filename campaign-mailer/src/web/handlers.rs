//! Dashboard endpoint handlers: campaign, contacts, settings and reporting.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::ApiError;
use super::AppState;
use crate::campaign::{send_campaign as run_campaign, Analytics, CampaignSendResult};
use crate::relay::{BulkEmail, BulkResult, HealthReport};
use crate::store::{AppSettings, Campaign, CampaignUpdate, Contact, EmailRecord, NewContact};
use crate::util::is_valid_email;

const DASHBOARD_PAGE: &str = include_str!("../../assets/dashboard.html");

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn dashboard_page() -> Html<&'static str> {
    Html(DASHBOARD_PAGE)
}

/// Acknowledgement for mutations.
#[derive(Debug, Serialize)]
pub struct MessageResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> MessageResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: Some(data),
        })
    }
}

// =============================================================================
// Campaign
// =============================================================================

pub async fn get_campaign(State(state): State<AppState>) -> Json<Campaign> {
    Json(state.campaign.read().await.clone())
}

pub async fn update_campaign(
    State(state): State<AppState>,
    payload: Result<Json<CampaignUpdate>, JsonRejection>,
) -> Result<Json<MessageResponse<Campaign>>, ApiError> {
    let Json(update) = payload?;
    let mut campaign = state.campaign.write().await;
    campaign.apply(update);
    info!(subject = %campaign.subject, body_length = campaign.body.len(), "campaign_updated");
    Ok(MessageResponse::ok("Campaign updated successfully!", campaign.clone()))
}

pub async fn send_campaign(State(state): State<AppState>) -> Result<Json<CampaignSendResult>, ApiError> {
    let campaign = state.campaign.read().await.clone();
    let result = run_campaign(
        &state.store,
        &state.relay,
        &campaign,
        &state.config.public_base_url,
    )
    .await?;
    Ok(Json(result))
}

// =============================================================================
// Contacts
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ContactIds {
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Affected {
    pub affected: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BulkContacts {
    Wrapped { contacts: Vec<NewContact> },
    List(Vec<NewContact>),
}

impl BulkContacts {
    fn into_vec(self) -> Vec<NewContact> {
        match self {
            BulkContacts::Wrapped { contacts } | BulkContacts::List(contacts) => contacts,
        }
    }
}

pub async fn list_contacts(State(state): State<AppState>) -> Result<Json<Vec<Contact>>, ApiError> {
    Ok(Json(state.store.list_contacts().await?))
}

pub async fn add_contact(
    State(state): State<AppState>,
    payload: Result<Json<NewContact>, JsonRejection>,
) -> Result<Json<MessageResponse<Contact>>, ApiError> {
    let Json(data) = payload?;
    let contact = state.store.add_contact(data).await?;
    Ok(MessageResponse::ok("Contact added successfully!", contact))
}

pub async fn add_contacts_bulk(
    State(state): State<AppState>,
    payload: Result<Json<BulkContacts>, JsonRejection>,
) -> Result<Json<MessageResponse<Vec<Contact>>>, ApiError> {
    let Json(batch) = payload?;
    let batch = batch.into_vec();
    if batch.is_empty() {
        return Err(ApiError::BadRequest("No contacts provided".to_string()));
    }
    let added = state.store.add_contacts(batch).await?;
    Ok(MessageResponse::ok(format!("Added {} contacts", added.len()), added))
}

pub async fn delete_contacts(
    State(state): State<AppState>,
    payload: Result<Json<ContactIds>, JsonRejection>,
) -> Result<Json<MessageResponse<Affected>>, ApiError> {
    let Json(req) = payload?;
    let change = state.store.delete_contacts(&req.ids).await?;
    Ok(MessageResponse::ok(
        format!("Deleted {} contacts", change.affected),
        Affected { affected: change.affected },
    ))
}

pub async fn clean_contacts(
    State(state): State<AppState>,
    payload: Result<Json<ContactIds>, JsonRejection>,
) -> Result<Json<MessageResponse<Affected>>, ApiError> {
    let Json(req) = payload?;
    let change = state.store.clean_contacts(&req.ids).await?;
    Ok(MessageResponse::ok(
        format!("Cleaned {} contacts", change.affected),
        Affected { affected: change.affected },
    ))
}

// =============================================================================
// Settings
// =============================================================================

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<AppSettings>, ApiError> {
    Ok(Json(state.store.load_settings().await?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    payload: Result<Json<AppSettings>, JsonRejection>,
) -> Result<Json<MessageResponse<AppSettings>>, ApiError> {
    let Json(settings) = payload?;
    let saved = state.store.save_settings(settings).await?;
    Ok(MessageResponse::ok("Settings updated successfully!", saved))
}

pub async fn reset_settings(State(state): State<AppState>) -> Result<Json<MessageResponse<AppSettings>>, ApiError> {
    let settings = state.store.reset_settings().await?;
    Ok(MessageResponse::ok("Settings reset to defaults", settings))
}

// =============================================================================
// Reporting
// =============================================================================

pub async fn analytics(State(state): State<AppState>) -> Result<Json<Analytics>, ApiError> {
    let contacts = state.store.load_contacts().await?;
    Ok(Json(Analytics::of(&contacts)))
}

/// Send records, most recent activity first.
pub async fn list_emails(State(state): State<AppState>) -> Result<Json<Vec<EmailRecord>>, ApiError> {
    let mut records = state.store.load_email_records().await?;
    records.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
    Ok(Json(records))
}

// =============================================================================
// Relay
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHealthResponse {
    pub success: bool,
    pub backend_url: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthReport>,
}

/// Connectivity test against the relay.
pub async fn backend_health(State(state): State<AppState>) -> Response {
    let backend_url = state.relay.base_url().to_string();
    match state.relay.health().await {
        Ok(health) => (
            StatusCode::OK,
            Json(BackendHealthResponse {
                success: true,
                backend_url,
                message: "Backend connection successful".to_string(),
                health: Some(health),
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(backend_url = %backend_url, error = %e, "backend_health_failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(BackendHealthResponse {
                    success: false,
                    backend_url,
                    message: e.to_string(),
                    health: None,
                }),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// One-off send through the relay.
pub async fn send_email(
    State(state): State<AppState>,
    payload: Result<Json<SendEmailRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let to = req.to.trim().to_string();
    if !is_valid_email(&to) {
        return Err(ApiError::BadRequest(format!("Invalid email address: {to}")));
    }

    let settings = state.store.load_settings().await?;
    let email = BulkEmail {
        contact_id: None,
        to: to.clone(),
        subject: req.subject,
        html: req.html,
        text: req.text,
        sender_name: Some(settings.team_lead_name),
        reply_to: Some(settings.reply_to_email),
    };

    let response = state.relay.send_bulk(vec![email]).await?;
    let result = response.results.into_iter().next().unwrap_or_else(|| BulkResult {
        success: false,
        message_id: None,
        to: to.clone(),
        status: None,
        error: Some("relay returned no result".to_string()),
        contact_id: None,
    });

    info!(to = %to, success = result.success, "single_email_sent");
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(result)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::relay::testing::{instant_mock, spawn_relay};
    use crate::web::testing::{call, send_raw, state_with_relay, test_state};

    #[tokio::test]
    async fn test_health_and_page() {
        let (_dir, state) = test_state();
        let (status, body) = call(state.clone(), "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let response = crate::web::testing::get_raw(state, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_campaign_get_and_partial_update() {
        let (_dir, state) = test_state();
        let (_, before) = call(state.clone(), "GET", "/api/campaign", None).await;

        let (status, body) = call(state.clone(), "PUT", "/api/campaign", Some(json!({"subject": "New {{firstName}}"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["subject"], "New {{firstName}}");

        let (_, after) = call(state, "GET", "/api/campaign", None).await;
        assert_eq!(after["subject"], "New {{firstName}}");
        assert_eq!(after["body"], before["body"]);
    }

    #[tokio::test]
    async fn test_contact_lifecycle() {
        let (_dir, state) = test_state();

        let (status, body) = call(
            state.clone(),
            "POST",
            "/api/contacts",
            Some(json!({"firstName": "ada", "lastName": "lovelace", "email": "  ADA@Example.com "})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], "1");
        assert_eq!(body["data"]["status"], "Pending");

        let (status, body) = call(
            state.clone(),
            "POST",
            "/api/contacts/bulk",
            Some(json!({"contacts": [
                {"firstName": "Bob", "email": "bob@example.com"},
                {"firstName": "Cy", "email": "cy@example.com"}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let (_, body) = call(state.clone(), "POST", "/api/contacts/clean", Some(json!({"ids": ["1"]}))).await;
        assert_eq!(body["data"]["affected"], 1);

        let (_, contacts) = call(state.clone(), "GET", "/api/contacts", None).await;
        let ada = contacts.as_array().unwrap().iter().find(|c| c["id"] == "1").unwrap().clone();
        assert_eq!(ada["email"], "ada@example.com");
        assert_eq!(ada["firstName"], "Ada");

        let (_, body) = call(state.clone(), "POST", "/api/contacts/delete", Some(json!({"ids": ["1", "99"]}))).await;
        assert_eq!(body["data"]["affected"], 1);

        let (_, analytics) = call(state, "GET", "/api/analytics", None).await;
        assert_eq!(analytics["total"], 2);
        assert_eq!(analytics["pending"], 2);
    }

    #[tokio::test]
    async fn test_add_contact_rejects_bad_email() {
        let (_dir, state) = test_state();
        let (status, body) = call(state.clone(), "POST", "/api/contacts", Some(json!({"firstName": "X", "email": "nope"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = call(state, "POST", "/api/contacts/bulk", Some(json!([]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_bodies_get_json_errors() {
        let (_dir, state) = test_state();
        let json = Some("application/json");
        let cases = [
            ("POST", "/api/contacts", json, r#"{"firstName": "X"}"#, StatusCode::UNPROCESSABLE_ENTITY),
            ("POST", "/api/contacts/delete", json, "{not json", StatusCode::BAD_REQUEST),
            ("PUT", "/api/settings", None, r#"{"companyName": "Acme"}"#, StatusCode::UNSUPPORTED_MEDIA_TYPE),
            ("POST", "/api/send-email", json, r#"{"subject": "Hi"}"#, StatusCode::UNPROCESSABLE_ENTITY),
        ];

        for (method, uri, content_type, raw, expected) in cases {
            let (status, body) = send_raw(state.clone(), method, uri, content_type, raw).await;
            assert_eq!(status, expected, "{method} {uri}");
            assert_eq!(body["success"], false, "{method} {uri}");
            assert!(body["message"].as_str().unwrap().starts_with("Invalid request body"));
            assert!(body["timestamp"].is_string());
        }

        let (_, contacts) = call(state, "GET", "/api/contacts", None).await;
        assert!(contacts.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settings_update_and_reset() {
        let (_dir, state) = test_state();
        let (status, body) = call(
            state.clone(),
            "PUT",
            "/api/settings",
            Some(json!({"teamLeadName": "", "companyName": "Acme", "realtimeTracking": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["teamLeadName"], "The Bagga Bugs Team");
        assert_eq!(body["data"]["companyName"], "Acme");

        let (_, settings) = call(state.clone(), "GET", "/api/settings", None).await;
        assert_eq!(settings["realtimeTracking"], false);

        let (_, body) = call(state, "POST", "/api/settings/reset", None).await;
        assert_eq!(body["data"]["companyName"], "Bagga Bugs");
        assert_eq!(body["data"]["realtimeTracking"], true);
    }

    #[tokio::test]
    async fn test_campaign_send_end_to_end() {
        let url = spawn_relay(Some(instant_mock())).await;
        let (_dir, state) = state_with_relay(url);
        call(state.clone(), "POST", "/api/contacts", Some(json!({"firstName": "Ada", "email": "ada@example.com"}))).await;

        let (status, body) = call(state.clone(), "POST", "/api/campaign/send", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["stats"]["sent"], 1);

        let (_, emails) = call(state.clone(), "GET", "/api/emails", None).await;
        assert_eq!(emails.as_array().unwrap().len(), 1);
        assert_eq!(emails[0]["status"], "Sent");

        let (_, body) = call(state.clone(), "POST", "/api/tracking/test", None).await;
        assert_eq!(body["success"], true);

        let (_, analytics) = call(state, "GET", "/api/analytics", None).await;
        assert_eq!(analytics["opened"], 1);
        assert_eq!(analytics["openRate"], 100.0);
    }

    #[tokio::test]
    async fn test_backend_health_and_single_send() {
        let url = spawn_relay(Some(instant_mock())).await;
        let (_dir, state) = state_with_relay(url);

        let (status, body) = call(state.clone(), "GET", "/api/backend/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["health"]["emailService"]["status"], "mock_ready");

        let (status, body) = call(
            state.clone(),
            "POST",
            "/api/send-email",
            Some(json!({"to": "ada@example.com", "subject": "Hi", "html": "<p>Hi</p>"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, _) = call(state, "POST", "/api/send-email", Some(json!({"to": "bad", "subject": "Hi"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backend_health_unreachable() {
        let (_dir, state) = test_state();
        let (status, body) = call(state, "GET", "/api/backend/health", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
    }
}
