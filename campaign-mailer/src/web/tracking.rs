//! Open tracking: the pixel endpoint and its diagnostics.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::AppState;
use crate::campaign::{render_email, tracking_pixel_tag, TrackingStats};
use crate::html::{find_tracking_pixel, TrackingPixel};
use crate::store::{Contact, ContactStatus, NewContact};

/// Transparent 1x1 RGBA PNG.
pub const TRACKING_PIXEL: [u8; 67] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

fn pixel_response() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
            (header::CONTENT_LENGTH, "67"),
        ],
        TRACKING_PIXEL.as_slice(),
    )
        .into_response()
}

/// `GET /api/track/:contact_id`. Always answers with the pixel.
pub async fn track_open(
    State(state): State<AppState>,
    Path(contact_id): Path<String>,
) -> Response {
    match state.store.record_open(&contact_id, crate::util::now()).await {
        Ok(true) => info!(contact_id = %contact_id, "tracking_open_recorded"),
        Ok(false) => debug!(contact_id = %contact_id, "tracking_open_no_change"),
        Err(e) => warn!(contact_id = %contact_id, error = %e, "tracking_open_failed"),
    }
    pixel_response()
}

pub async fn tracking_stats(State(state): State<AppState>) -> Result<Json<TrackingStats>, ApiError> {
    let contacts = state.store.load_contacts().await?;
    Ok(Json(TrackingStats::of(&contacts, crate::util::now())))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingTestResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
}

/// Simulate an open for the first contact in Sent state.
pub async fn tracking_test(State(state): State<AppState>) -> Result<Json<TrackingTestResponse>, ApiError> {
    let contacts = state.store.load_contacts().await?;
    let Some(contact) = contacts.iter().find(|c| c.status == ContactStatus::Sent) else {
        return Ok(Json(TrackingTestResponse {
            success: false,
            message: "No sent contacts available to test tracking".to_string(),
            contact_id: None,
        }));
    };

    let opened = state.store.record_open(&contact.id, crate::util::now()).await?;
    info!(contact_id = %contact.id, opened = opened, "tracking_test_run");

    Ok(Json(TrackingTestResponse {
        success: opened,
        message: if opened {
            format!("Marked {} as opened", contact.email)
        } else {
            format!("{} was not updated", contact.email)
        },
        contact_id: Some(contact.id.clone()),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingDebugResponse {
    pub tracking_enabled: bool,
    pub base_url: String,
    pub sample_contact_id: String,
    pub expected_tag: String,
    pub pixel_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel: Option<TrackingPixel>,
    pub html_length: usize,
}

/// Render the current campaign for a sample contact and report the pixel.
pub async fn tracking_debug(State(state): State<AppState>) -> Result<Json<TrackingDebugResponse>, ApiError> {
    let settings = state.store.load_settings().await?;
    let contact = state
        .store
        .load_contacts()
        .await?
        .into_iter()
        .next()
        .unwrap_or_else(|| {
            Contact::new(
                "0".to_string(),
                NewContact {
                    first_name: "Sample".to_string(),
                    last_name: "Contact".to_string(),
                    email: "sample@example.com".to_string(),
                },
            )
        });

    let campaign = state.campaign.read().await.clone();
    let base_url = &state.config.public_base_url;
    let rendered = render_email(&campaign, &contact, &settings, base_url, &crate::util::now());
    let pixel = find_tracking_pixel(&rendered.html);

    Ok(Json(TrackingDebugResponse {
        tracking_enabled: settings.realtime_tracking,
        base_url: base_url.clone(),
        expected_tag: tracking_pixel_tag(base_url, &contact.id),
        sample_contact_id: contact.id,
        pixel_found: pixel.is_some(),
        pixel,
        html_length: rendered.html.len(),
    }))
}
