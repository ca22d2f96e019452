//! Persisted data model: contacts, send records, campaign and settings.
//!
//! Field names are camelCase on disk so the JSON files stay readable by the
//! dashboard script.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::time::iso_millis_opt;

// =============================================================================
// Contact
// =============================================================================

/// Delivery state of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContactStatus {
    #[default]
    Pending,
    Sent,
    Opened,
    Error,
}

impl ContactStatus {
    /// True once an email has been delivered to the relay for this contact.
    pub fn was_sent(self) -> bool {
        matches!(self, ContactStatus::Sent | ContactStatus::Opened)
    }
}

/// A campaign recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: ContactStatus,
    #[serde(default, with = "iso_millis_opt")]
    pub sent_timestamp: Option<DateTime<Utc>>,
    #[serde(default, with = "iso_millis_opt")]
    pub open_timestamp: Option<DateTime<Utc>>,
}

/// Operator-supplied fields for a new contact.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
}

impl Contact {
    /// Create a pending contact with the given id.
    pub fn new(id: String, data: NewContact) -> Self {
        Self {
            id,
            first_name: data.first_name,
            last_name: data.last_name,
            email: data.email,
            status: ContactStatus::Pending,
            sent_timestamp: None,
            open_timestamp: None,
        }
    }

    /// "First Last", trimmed.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Most recent activity, used to order listings.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.open_timestamp.or(self.sent_timestamp)
    }

    /// Pending -> Sent. Returns false when the contact is not pending.
    pub fn mark_sent(&mut self, at: DateTime<Utc>) -> bool {
        if self.status != ContactStatus::Pending {
            return false;
        }
        self.status = ContactStatus::Sent;
        self.sent_timestamp = Some(at);
        true
    }

    /// Pending -> Error. Returns false when the contact is not pending.
    pub fn mark_error(&mut self) -> bool {
        if self.status != ContactStatus::Pending {
            return false;
        }
        self.status = ContactStatus::Error;
        true
    }

    /// Sent -> Opened. Any other starting state, including an earlier open,
    /// leaves the contact untouched.
    pub fn mark_opened(&mut self, at: DateTime<Utc>) -> bool {
        if self.status != ContactStatus::Sent {
            return false;
        }
        self.status = ContactStatus::Opened;
        self.open_timestamp = Some(at);
        true
    }

    /// Sent -> Pending, used when a whole bulk send is rolled back.
    pub fn revert_to_pending(&mut self) -> bool {
        if self.status != ContactStatus::Sent {
            return false;
        }
        self.status = ContactStatus::Pending;
        self.sent_timestamp = None;
        true
    }

    /// Normalize whitespace and casing of the operator-entered fields.
    pub fn clean(&mut self) {
        self.email = self.email.trim().to_lowercase();
        self.first_name = capitalize(self.first_name.trim());
        self.last_name = capitalize(self.last_name.trim());
    }
}

/// Upper-case the first character, lower-case the rest.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Next numeric id: one above the largest numeric id in use.
pub fn next_contact_id(contacts: &[Contact]) -> u64 {
    contacts
        .iter()
        .filter_map(|c| c.id.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

// =============================================================================
// Email records
// =============================================================================

/// Outcome recorded for a single send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmailStatus {
    #[default]
    Sent,
    Opened,
    Error,
}

/// Campaign snapshot stored alongside a send record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignData {
    pub subject: String,
    pub body: String,
    pub sender_name: String,
}

/// Log entry for one send attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub contact_id: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, with = "iso_millis_opt")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default, with = "iso_millis_opt")]
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: EmailStatus,
    #[serde(default)]
    pub campaign_data: Option<CampaignData>,
}

impl EmailRecord {
    /// Record a successful send to `contact`.
    pub fn sent(
        id: String,
        contact: &Contact,
        subject: String,
        at: DateTime<Utc>,
        campaign_data: Option<CampaignData>,
    ) -> Self {
        Self {
            id,
            contact_id: contact.id.clone(),
            contact_email: contact.email.clone(),
            contact_name: contact.full_name(),
            subject,
            sent_at: Some(at),
            opened_at: None,
            status: EmailStatus::Sent,
            campaign_data,
        }
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.opened_at.or(self.sent_at)
    }
}

// =============================================================================
// Campaign
// =============================================================================

/// The single editable email template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub subject: String,
    pub body: String,
}

impl Default for Campaign {
    fn default() -> Self {
        Self {
            subject: "Hello {{firstName}}, Important Message for you".to_string(),
            body: "Dear {{firstName}} {{lastName}},\n\n\
                   We hope this message finds you well!\n\n\
                   We wanted to share something important with you about {{companyName}} - \
                   our new email solution. It's designed to be powerful and easy to use.\n\n\
                   Learn more on our website.\n\n\
                   Best regards,\n\
                   {{teamLeadName}}"
                .to_string(),
        }
    }
}

/// Partial campaign update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignUpdate {
    pub subject: Option<String>,
    pub body: Option<String>,
}

impl Campaign {
    pub fn apply(&mut self, update: CampaignUpdate) {
        if let Some(subject) = update.subject {
            self.subject = subject;
        }
        if let Some(body) = update.body {
            self.body = body;
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

pub const DEFAULT_TEAM_LEAD_NAME: &str = "The Bagga Bugs Team";
pub const DEFAULT_COMPANY_NAME: &str = "Bagga Bugs";
pub const DEFAULT_FROM_EMAIL: &str = "contact@baggabugs.dev";
pub const DEFAULT_REPLY_TO_EMAIL: &str = "reply@baggabugs.dev";

/// Sender identity and tracking toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub team_lead_name: String,
    pub realtime_tracking: bool,
    pub company_name: String,
    pub from_email: String,
    pub reply_to_email: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            team_lead_name: DEFAULT_TEAM_LEAD_NAME.to_string(),
            realtime_tracking: true,
            company_name: DEFAULT_COMPANY_NAME.to_string(),
            from_email: DEFAULT_FROM_EMAIL.to_string(),
            reply_to_email: DEFAULT_REPLY_TO_EMAIL.to_string(),
        }
    }
}

impl AppSettings {
    /// Replace blank text fields with their defaults.
    pub fn normalized(self) -> Self {
        let defaults = AppSettings::default();
        let or_default = |value: String, fallback: String| {
            if value.trim().is_empty() {
                fallback
            } else {
                value
            }
        };

        Self {
            team_lead_name: or_default(self.team_lead_name, defaults.team_lead_name),
            realtime_tracking: self.realtime_tracking,
            company_name: or_default(self.company_name, defaults.company_name),
            from_email: or_default(self.from_email, defaults.from_email),
            reply_to_email: or_default(self.reply_to_email, defaults.reply_to_email),
        }
    }
}
