//! Wire types shared by the relay server and its dashboard client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Bulk send
// =============================================================================

/// One message in a bulk request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEmail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkRequest {
    #[serde(default)]
    pub emails: Vec<BulkEmail>,
}

/// Outcome of one message in a bulk request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
}

impl BulkSummary {
    pub fn of(results: &[BulkResult]) -> Self {
        let sent = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            sent,
            failed: results.len() - sent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub results: Vec<BulkResult>,
    #[serde(default)]
    pub summary: BulkSummary,
}

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailServiceHealth {
    /// Live status, re-verified for SMTP.
    pub status: String,
    /// Status recorded at start-up.
    #[serde(default)]
    pub service_status: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub using_mock_email: bool,
}

impl EmailServiceHealth {
    /// True when the relay will attempt sends.
    pub fn is_usable(&self) -> bool {
        matches!(self.status.as_str(), "ready" | "mock_ready")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpHealth {
    pub host: String,
    pub port: String,
    pub user: String,
    pub pass: String,
    pub from_email: String,
    pub mock_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockEmailHealth {
    pub total_sent: usize,
    pub last_sent: Option<DateTime<Utc>>,
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub email_service: EmailServiceHealth,
    #[serde(default)]
    pub smtp: SmtpHealth,
    #[serde(default)]
    pub uptime: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub mock_emails: Option<MockEmailHealth>,
}

// =============================================================================
// Test and contact-form emails
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestEmailRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFormRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub html_content: Option<String>,
}
