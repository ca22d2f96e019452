//! Batched bulk sending.

use std::time::Duration;

use tracing::{info, warn};

use super::types::{BulkEmail, BulkResult, BulkSummary};
use crate::transport::{MailOptions, Mailer};

pub const DEFAULT_SENDER_NAME: &str = "Bagga Bugs";

/// Send a single bulk entry and turn the outcome into a result row.
pub async fn send_single(mailer: &Mailer, from: &str, email: &BulkEmail) -> BulkResult {
    let options = MailOptions {
        from_name: Some(
            email
                .sender_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()),
        ),
        from: from.to_string(),
        to: email.to.clone(),
        reply_to: Some(
            email
                .reply_to
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| from.to_string()),
        ),
        subject: if email.subject.is_empty() {
            "No Subject".to_string()
        } else {
            email.subject.clone()
        },
        html: email.html.clone(),
        text: email.text.clone().filter(|t| !t.is_empty()),
    };

    match mailer.send(&options).await {
        Ok(info) => BulkResult {
            success: true,
            message_id: Some(info.message_id),
            to: email.to.clone(),
            status: Some("sent".to_string()),
            error: None,
            contact_id: email.contact_id.clone(),
        },
        Err(e) => {
            warn!(to = %email.to, contact_id = ?email.contact_id, error = %e, "bulk_email_failed");
            BulkResult {
                success: false,
                message_id: None,
                to: email.to.clone(),
                status: None,
                error: Some(e.to_string()),
                contact_id: email.contact_id.clone(),
            }
        }
    }
}

/// Send `emails` in consecutive batches of `concurrency`, waiting for each
/// batch to finish and pausing `batch_delay` between batches.
///
/// Results come back in input order.
pub async fn send_bulk(
    mailer: &Mailer,
    from: &str,
    emails: &[BulkEmail],
    concurrency: usize,
    batch_delay: Duration,
) -> Vec<BulkResult> {
    let batch_size = concurrency.max(1);
    let batch_count = emails.len().div_ceil(batch_size);
    let mut results = Vec::with_capacity(emails.len());

    for (index, batch) in emails.chunks(batch_size).enumerate() {
        info!(
            batch = index + 1,
            batches = batch_count,
            size = batch.len(),
            "bulk_batch_starting"
        );

        let futures: Vec<_> = batch
            .iter()
            .map(|email| send_single(mailer, from, email))
            .collect();
        results.extend(futures::future::join_all(futures).await);

        if index + 1 < batch_count && !batch_delay.is_zero() {
            tokio::time::sleep(batch_delay).await;
        }
    }

    let summary = BulkSummary::of(&results);
    info!(
        total = summary.total,
        sent = summary.sent,
        failed = summary.failed,
        "bulk_send_complete"
    );

    results
}
