//! Campaign send orchestration.
//!
//! ```text
//! pending contacts ─► relay health ─► claim (Pending→Sent) ─► render ─► POST /api/send-bulk
//!                                                                      │
//!             ok: per-result Sent / Error, records appended ◄───────────┤
//!             batch failure: claimed contacts back to Pending ◄────────┘
//! ```

use std::collections::HashMap;

use serde::Serialize;
use tracing::{error, info, warn};

use super::render::render_email;
use crate::relay::{BulkEmail, BulkResult, RelayClient, RelayError};
use crate::store::{
    new_record_id, CampaignData, Campaign, Contact, ContactStatus, EmailRecord, Store, StoreError,
};

pub const NO_PENDING_MESSAGE: &str = "No pending contacts to send to!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SendStats {
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
}

/// Outcome reported to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignSendResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SendStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl CampaignSendResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            stats: None,
            errors: None,
        }
    }
}

/// Check that the relay answers and its mail service can send.
///
/// Returns a user-facing failure message otherwise.
pub async fn check_relay(relay: &RelayClient) -> Result<(), String> {
    match relay.health().await {
        Ok(health) if health.email_service.is_usable() => Ok(()),
        Ok(health) => {
            warn!(status = %health.email_service.status, "relay_email_service_not_ready");
            Err(format!(
                "Email service not ready. Status: {}",
                health.email_service.status
            ))
        }
        Err(e) => {
            warn!(relay = %relay.base_url(), error = %e, "relay_unreachable");
            Err(format!("Cannot connect to email backend: {e}"))
        }
    }
}

/// Send the campaign to every pending contact.
///
/// Targeted contacts are claimed as Sent before dispatch so a concurrent send
/// cannot pick them up again. Per-email failures become Error; a failure of
/// the whole request returns every claimed contact to Pending.
pub async fn send_campaign(
    store: &Store,
    relay: &RelayClient,
    campaign: &Campaign,
    base_url: &str,
) -> Result<CampaignSendResult, StoreError> {
    let settings = store.load_settings().await?;
    let pending = store
        .load_contacts()
        .await?
        .iter()
        .filter(|c| c.status == ContactStatus::Pending)
        .count();
    if pending == 0 {
        return Ok(CampaignSendResult::failure(NO_PENDING_MESSAGE));
    }

    info!(pending = pending, "campaign_send_started");

    if let Err(message) = check_relay(relay).await {
        return Ok(CampaignSendResult::failure(message));
    }

    let now = crate::util::now();
    let claimed: Vec<Contact> = store
        .update_contacts(|contacts| {
            contacts
                .iter_mut()
                .filter(|c| c.status == ContactStatus::Pending)
                .filter_map(|c| c.mark_sent(now).then(|| c.clone()))
                .collect()
        })
        .await?;
    if claimed.is_empty() {
        return Ok(CampaignSendResult::failure(NO_PENDING_MESSAGE));
    }

    let emails: Vec<BulkEmail> = claimed
        .iter()
        .map(|contact| {
            let rendered = render_email(campaign, contact, &settings, base_url, &now);
            BulkEmail {
                contact_id: Some(contact.id.clone()),
                to: contact.email.clone(),
                subject: rendered.subject,
                html: rendered.html,
                text: Some(rendered.text),
                sender_name: Some(settings.team_lead_name.clone()),
                reply_to: Some(settings.reply_to_email.clone()),
            }
        })
        .collect();
    let subjects: HashMap<String, String> = emails
        .iter()
        .filter_map(|e| Some((e.contact_id.clone()?, e.subject.clone())))
        .collect();

    let response = match relay.send_bulk(emails).await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, claimed = claimed.len(), "campaign_send_failed");
            let ids: Vec<&str> = claimed.iter().map(|c| c.id.as_str()).collect();
            let reverted = store
                .update_contacts(|contacts| {
                    contacts
                        .iter_mut()
                        .filter(|c| ids.contains(&c.id.as_str()))
                        .map(|c| c.revert_to_pending())
                        .filter(|reverted| *reverted)
                        .count()
                })
                .await?;
            info!(reverted = reverted, "campaign_claims_reverted");

            let message = match e {
                RelayError::Timeout { .. } => {
                    "Campaign timed out - this may happen with large contact lists".to_string()
                }
                other => format!("Campaign failed: {other}"),
            };
            return Ok(CampaignSendResult::failure(message));
        }
    };

    let outcomes = match_results(&claimed, &response.results);
    let mut sent = Vec::new();
    let mut errors = Vec::new();

    store
        .update_contacts(|contacts| {
            for contact in contacts.iter_mut() {
                let Some(outcome) = outcomes.get(&contact.id) else {
                    continue;
                };
                match outcome {
                    Some(result) if result.success => {}
                    Some(_) => {
                        contact.revert_to_pending();
                        contact.mark_error();
                    }
                    None => {
                        contact.revert_to_pending();
                    }
                }
            }
        })
        .await?;

    for contact in &claimed {
        match outcomes.get(&contact.id) {
            Some(Some(result)) if result.success => sent.push(contact),
            Some(Some(result)) => errors.push(format!(
                "{}: {}",
                contact.email,
                result.error.as_deref().unwrap_or("Unknown error")
            )),
            _ => warn!(contact_id = %contact.id, "campaign_result_missing"),
        }
    }

    let campaign_data = CampaignData {
        subject: campaign.subject.clone(),
        body: campaign.body.clone(),
        sender_name: settings.team_lead_name.clone(),
    };
    let records: Vec<EmailRecord> = sent
        .iter()
        .map(|contact| {
            EmailRecord::sent(
                new_record_id(),
                contact,
                subjects.get(&contact.id).cloned().unwrap_or_default(),
                now,
                Some(campaign_data.clone()),
            )
        })
        .collect();
    if let Err(e) = store.append_email_records(records).await {
        warn!(error = %e, "campaign_records_write_failed");
    }

    let stats = SendStats {
        sent: sent.len(),
        failed: errors.len(),
        total: claimed.len(),
    };
    info!(
        sent = stats.sent,
        failed = stats.failed,
        total = stats.total,
        "campaign_send_finished"
    );

    let message = if stats.failed > 0 {
        format!(
            "Campaign completed! {} emails sent successfully, {} failed.",
            stats.sent, stats.failed
        )
    } else {
        format!("Campaign sent successfully to {} recipients!", stats.sent)
    };

    Ok(CampaignSendResult {
        success: stats.sent > 0,
        message,
        stats: Some(stats),
        errors: (!errors.is_empty()).then_some(errors),
    })
}

/// Pair each claimed contact with its result: by contact id first, then by
/// email address. Contacts without a result map to `None`.
fn match_results<'a>(
    claimed: &[Contact],
    results: &'a [BulkResult],
) -> HashMap<String, Option<&'a BulkResult>> {
    let by_id: HashMap<&str, &BulkResult> = results
        .iter()
        .filter_map(|r| Some((r.contact_id.as_deref()?, r)))
        .collect();
    let by_email: HashMap<String, &BulkResult> = results
        .iter()
        .map(|r| (r.to.trim().to_lowercase(), r))
        .collect();

    claimed
        .iter()
        .map(|contact| {
            let result = by_id
                .get(contact.id.as_str())
                .or_else(|| by_email.get(&contact.email.trim().to_lowercase()))
                .copied();
            (contact.id.clone(), result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::relay::testing::spawn_relay;
    use crate::store::NewContact;
    use crate::transport::MockMailer;

    async fn seeded_store(emails: &[&str]) -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        store
            .add_contacts(
                emails
                    .iter()
                    .map(|e| NewContact {
                        first_name: "Test".to_string(),
                        last_name: "User".to_string(),
                        email: e.to_string(),
                    })
                    .collect(),
            )
            .await
            .unwrap();
        (dir, store)
    }

    fn client(url: String) -> RelayClient {
        RelayClient::new(url, Duration::from_secs(5), Duration::from_secs(5))
    }

    fn result(contact_id: Option<&str>, to: &str, success: bool) -> BulkResult {
        BulkResult {
            success,
            message_id: None,
            to: to.to_string(),
            status: None,
            error: (!success).then(|| "rejected".to_string()),
            contact_id: contact_id.map(str::to_string),
        }
    }

    #[test]
    fn test_match_results_prefers_contact_id() {
        let mut a = Contact::new("1".to_string(), NewContact {
            first_name: String::new(),
            last_name: String::new(),
            email: "shared@example.com".to_string(),
        });
        let mut b = a.clone();
        b.id = "2".to_string();
        let mut c = a.clone();
        c.id = "3".to_string();
        c.email = "Other@Example.com".to_string();
        a.status = ContactStatus::Sent;

        let results = vec![
            result(Some("2"), "shared@example.com", false),
            result(Some("1"), "shared@example.com", true),
            result(None, "other@example.com", true),
        ];
        let matched = match_results(&[a, b, c], &results);

        assert!(matched["1"].unwrap().success);
        assert!(!matched["2"].unwrap().success);
        assert!(matched["3"].unwrap().success);
    }

    #[tokio::test]
    async fn test_no_pending_contacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let relay = client("http://127.0.0.1:1".to_string());

        let result = send_campaign(&store, &relay, &Campaign::default(), "http://x").await.unwrap();
        assert!(!result.success);
        assert_eq!(result.message, NO_PENDING_MESSAGE);
    }

    #[tokio::test]
    async fn test_send_marks_contacts_and_records() {
        let (_dir, store) = seeded_store(&["ada@example.com", "bounce@example.com", "bob@example.com"]).await;
        let url = spawn_relay(Some(MockMailer::new(Duration::ZERO).rejecting(&["bounce@example.com"]))).await;

        let result = send_campaign(&store, &client(url), &Campaign::default(), "http://localhost:9002")
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.stats, Some(SendStats { sent: 2, failed: 1, total: 3 }));
        assert_eq!(
            result.message,
            "Campaign completed! 2 emails sent successfully, 1 failed."
        );
        assert!(result.errors.unwrap()[0].starts_with("bounce@example.com: "));

        let contacts = store.load_contacts().await.unwrap();
        let status_of = |email: &str| contacts.iter().find(|c| c.email == email).unwrap().status;
        assert_eq!(status_of("ada@example.com"), ContactStatus::Sent);
        assert_eq!(status_of("bob@example.com"), ContactStatus::Sent);
        assert_eq!(status_of("bounce@example.com"), ContactStatus::Error);
        assert!(contacts.iter().find(|c| c.email == "ada@example.com").unwrap().sent_timestamp.is_some());

        let records = store.load_email_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].subject, "Hello Test, Important Message for you");
        assert_eq!(
            records[0].campaign_data.as_ref().unwrap().sender_name,
            "The Bagga Bugs Team"
        );

        let again = send_campaign(&store, &client("http://127.0.0.1:1".to_string()), &Campaign::default(), "http://x")
            .await
            .unwrap();
        assert_eq!(again.message, NO_PENDING_MESSAGE);
    }

    #[tokio::test]
    async fn test_unreachable_relay_leaves_contacts_pending() {
        let (_dir, store) = seeded_store(&["ada@example.com"]).await;
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = send_campaign(&store, &client(format!("http://{addr}")), &Campaign::default(), "http://x")
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.message.starts_with("Cannot connect to email backend"));
        assert_eq!(store.load_contacts().await.unwrap()[0].status, ContactStatus::Pending);
    }

    #[tokio::test]
    async fn test_relay_not_ready_aborts() {
        let (_dir, store) = seeded_store(&["ada@example.com"]).await;
        let url = spawn_relay(None).await;

        let result = send_campaign(&store, &client(url), &Campaign::default(), "http://x")
            .await
            .unwrap();

        assert_eq!(result.message, "Email service not ready. Status: initializing");
        assert_eq!(store.load_contacts().await.unwrap()[0].status, ContactStatus::Pending);
    }

    #[tokio::test]
    async fn test_batch_failure_reverts_claims() {
        use axum::{routing::{get, post}, http::StatusCode, Json, Router};

        let (_dir, store) = seeded_store(&["ada@example.com", "bob@example.com"]).await;

        // Healthy relay whose bulk endpoint fails outright.
        let app = Router::new()
            .route(
                "/api/health",
                get(|| async {
                    Json(serde_json::json!({
                        "status": "running",
                        "timestamp": "2026-10-16T08:30:00.000Z",
                        "emailService": {"status": "ready"}
                    }))
                }),
            )
            .route("/api/send-bulk", post(|| async { StatusCode::BAD_GATEWAY }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let result = send_campaign(&store, &client(format!("http://{addr}")), &Campaign::default(), "http://x")
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.message.starts_with("Campaign failed: relay returned HTTP 502"));
        let contacts = store.load_contacts().await.unwrap();
        assert!(contacts.iter().all(|c| c.status == ContactStatus::Pending));
        assert!(contacts.iter().all(|c| c.sent_timestamp.is_none()));
        assert!(store.load_email_records().await.unwrap().is_empty());
    }
}
