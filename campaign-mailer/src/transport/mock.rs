//! In-memory transport used when no SMTP server is available.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use super::{build_message, MailOptions, SendInfo, TransportError};

/// A message the mock accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockEmail {
    pub message_id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
}

pub struct MockMailer {
    delay: Duration,
    rejected: Vec<String>,
    sent: Mutex<Vec<MockEmail>>,
}

impl MockMailer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            rejected: Vec::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Fail every send to these addresses.
    pub fn rejecting(mut self, addresses: &[&str]) -> Self {
        self.rejected = addresses.iter().map(|a| a.to_lowercase()).collect();
        self
    }

    /// Accept a message after the configured delay.
    pub async fn send(&self, options: &MailOptions) -> Result<SendInfo, TransportError> {
        let message_id = new_mock_id();
        build_message(options, &format!("<{message_id}@mock.local>"))?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.rejected.contains(&options.to.trim().to_lowercase()) {
            return Err(TransportError::Rejected(options.to.clone()));
        }

        self.sent.lock().await.push(MockEmail {
            message_id: message_id.clone(),
            from: options.from.clone(),
            to: options.to.clone(),
            subject: options.subject.clone(),
            sent_at: crate::util::now(),
        });

        info!(
            to = %options.to,
            subject = %options.subject,
            message_id = %message_id,
            "mock_email_sent"
        );

        Ok(SendInfo {
            message_id,
            accepted: vec![options.to.clone()],
            rejected: Vec::new(),
            response: "250 Message accepted".to_string(),
        })
    }

    pub async fn sent_emails(&self) -> Vec<MockEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn last_sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent.lock().await.last().map(|e| e.sent_at)
    }

    #[cfg(test)]
    pub async fn clear(&self) {
        self.sent.lock().await.clear();
        info!("mock_email_history_cleared");
    }
}

/// `mock_<unix-millis>_<9 lowercase alphanumerics>`
fn new_mock_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("mock_{}_{}", Utc::now().timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(to: &str) -> MailOptions {
        MailOptions {
            from_name: None,
            from: "contact@baggabugs.dev".to_string(),
            to: to.to_string(),
            reply_to: None,
            subject: "Hello".to_string(),
            html: "<p>Hi</p>".to_string(),
            text: None,
        }
    }

    #[tokio::test]
    async fn test_mock_records_sent_messages() {
        let mock = MockMailer::new(Duration::ZERO);
        let info = mock.send(&options("ada@example.com")).await.unwrap();

        assert!(info.message_id.starts_with("mock_"));
        assert_eq!(info.accepted, vec!["ada@example.com".to_string()]);
        assert_eq!(info.response, "250 Message accepted");

        let sent = mock.sent_emails().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert_eq!(mock.last_sent_at().await, Some(sent[0].sent_at));

        mock.clear().await;
        assert_eq!(mock.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_mock_rejects_configured_addresses() {
        let mock = MockMailer::new(Duration::ZERO).rejecting(&["Bounce@Example.com"]);
        let err = mock.send(&options("bounce@example.com")).await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected(_)));
        assert_eq!(mock.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_mock_rejects_malformed_address() {
        let mock = MockMailer::new(Duration::ZERO);
        assert!(mock.send(&options("nope")).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_applies_delay() {
        let mock = MockMailer::new(Duration::from_millis(500));
        let start = tokio::time::Instant::now();
        mock.send(&options("ada@example.com")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[test]
    fn test_mock_id_shape() {
        let id = new_mock_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts[0], "mock");
        assert_eq!(parts[2].len(), 9);
    }
}
