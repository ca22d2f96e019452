//! Whole-store views: statistics, export/import and backups.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::files::{read_json, Store};
use super::types::{AppSettings, Contact, ContactStatus, EmailRecord};
use super::StoreError;
use crate::util::time::iso_millis_opt;

/// Counters over the stored contacts and records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub contacts_count: usize,
    pub email_records_count: usize,
    pub sent_emails: usize,
    pub opened_emails: usize,
    pub open_rate: f64,
    pub recent_opens: usize,
    #[serde(with = "iso_millis_opt")]
    pub last_open_time: Option<DateTime<Utc>>,
    #[serde(with = "iso_millis_opt")]
    pub oldest_sent_time: Option<DateTime<Utc>>,
    #[serde(with = "iso_millis_opt")]
    pub newest_sent_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    #[serde(default, with = "iso_millis_opt")]
    pub oldest_sent: Option<DateTime<Utc>>,
    #[serde(default, with = "iso_millis_opt")]
    pub newest_sent: Option<DateTime<Utc>>,
    #[serde(default, with = "iso_millis_opt")]
    pub oldest_open: Option<DateTime<Utc>>,
    #[serde(default, with = "iso_millis_opt")]
    pub newest_open: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampSummary {
    pub total_contacts: usize,
    pub contacts_with_sent_time: usize,
    pub contacts_with_open_time: usize,
    pub email_records_count: usize,
    pub date_range: DateRange,
}

/// Full snapshot of the store, also the backup file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub contacts: Vec<Contact>,
    pub email_records: Vec<EmailRecord>,
    pub settings: AppSettings,
    #[serde(default, with = "iso_millis_opt")]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timestamp_summary: Option<TimestampSummary>,
}

/// Import payload; absent sections are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDocument {
    pub contacts: Option<Vec<Contact>>,
    pub email_records: Option<Vec<EmailRecord>>,
    pub settings: Option<AppSettings>,
}

impl From<ExportDocument> for ImportDocument {
    fn from(doc: ExportDocument) -> Self {
        Self {
            contacts: Some(doc.contacts),
            email_records: Some(doc.email_records),
            settings: Some(doc.settings),
        }
    }
}

/// Percentage rounded to two decimals; zero when `whole` is zero.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}

fn summarize(contacts: &[Contact], records: &[EmailRecord]) -> TimestampSummary {
    let sent: Vec<DateTime<Utc>> = contacts.iter().filter_map(|c| c.sent_timestamp).collect();
    let opened: Vec<DateTime<Utc>> = contacts.iter().filter_map(|c| c.open_timestamp).collect();

    TimestampSummary {
        total_contacts: contacts.len(),
        contacts_with_sent_time: sent.len(),
        contacts_with_open_time: opened.len(),
        email_records_count: records.len(),
        date_range: DateRange {
            oldest_sent: sent.iter().min().copied(),
            newest_sent: sent.iter().max().copied(),
            oldest_open: opened.iter().min().copied(),
            newest_open: opened.iter().max().copied(),
        },
    }
}

impl Store {
    pub async fn storage_stats(&self, now: DateTime<Utc>) -> Result<StorageStats, StoreError> {
        let contacts = self.load_contacts().await?;
        let records = self.load_email_records().await?;

        let sent = contacts.iter().filter(|c| c.status.was_sent()).count();
        let opened = contacts
            .iter()
            .filter(|c| c.status == ContactStatus::Opened)
            .count();
        let cutoff = now - Duration::hours(24);
        let recent_opens = contacts
            .iter()
            .filter(|c| c.open_timestamp.is_some_and(|t| t > cutoff))
            .count();
        let summary = summarize(&contacts, &records);

        Ok(StorageStats {
            contacts_count: contacts.len(),
            email_records_count: records.len(),
            sent_emails: sent,
            opened_emails: opened,
            open_rate: percentage(opened, sent),
            recent_opens,
            last_open_time: summary.date_range.newest_open,
            oldest_sent_time: summary.date_range.oldest_sent,
            newest_sent_time: summary.date_range.newest_sent,
        })
    }

    pub async fn export_data(&self) -> Result<ExportDocument, StoreError> {
        let contacts = self.load_contacts().await?;
        let email_records = self.load_email_records().await?;
        let settings = self.load_settings().await?;
        let timestamp_summary = Some(summarize(&contacts, &email_records));

        Ok(ExportDocument {
            contacts,
            email_records,
            settings,
            exported_at: Some(crate::util::now()),
            timestamp_summary,
        })
    }

    pub async fn import_data(&self, doc: ImportDocument) -> Result<(), StoreError> {
        let contacts = doc.contacts.as_ref().map(Vec::len);
        let records = doc.email_records.as_ref().map(Vec::len);

        if let Some(contacts) = doc.contacts {
            self.save_contacts(&contacts).await?;
        }
        if let Some(records) = doc.email_records {
            self.save_email_records(&records).await?;
        }
        if let Some(settings) = doc.settings {
            self.save_settings(settings).await?;
        }

        info!(contacts = ?contacts, email_records = ?records, "data_imported");
        Ok(())
    }

    /// Write an export snapshot to `backup-<timestamp>.json` in the data
    /// directory and return the file name.
    pub async fn create_backup(&self) -> Result<String, StoreError> {
        let doc = self.export_data().await?;
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
        let name = format!("backup-{stamp}.json");
        self.write_json(&name, &doc).await?;
        info!(file = %name, "backup_created");
        Ok(name)
    }

    /// Restore a backup by file name. Only plain `backup-*.json` names inside
    /// the data directory are accepted.
    pub async fn restore_backup(&self, name: &str) -> Result<(), StoreError> {
        let is_plain_name = name.starts_with("backup-")
            && name.ends_with(".json")
            && !name.contains(['/', '\\'])
            && !name.contains("..");
        if !is_plain_name {
            return Err(StoreError::BackupNotFound(name.to_string()));
        }

        let path = self.path(name);
        if !path.exists() {
            return Err(StoreError::BackupNotFound(name.to_string()));
        }

        let doc: ExportDocument = read_json(&path).await?;
        self.import_data(doc.into()).await?;
        info!(file = %name, "backup_restored");
        Ok(())
    }

    /// Empty the contact list and record log and reset settings.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        self.save_contacts(&[]).await?;
        self.save_email_records(&[]).await?;
        self.reset_settings().await?;
        info!("data_cleared");
        Ok(())
    }
}
