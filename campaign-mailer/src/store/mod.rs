//! Flat-file persistence for contacts, send records and settings.
//!
//! ## Layout
//!
//! ```text
//! <data dir>/contacts.json   Vec<Contact>
//! <data dir>/emails.json     Vec<EmailRecord>
//! <data dir>/settings.json   AppSettings
//! ```

pub mod contacts;
pub mod export;
pub mod files;
pub mod types;

use std::path::PathBuf;

use thiserror::Error;

pub use contacts::ContactChange;
pub use export::{ExportDocument, ImportDocument, StorageStats};
pub use files::{new_record_id, Store, CONTACTS_FILE, EMAILS_FILE, SETTINGS_FILE};
pub use types::{
    AppSettings, Campaign, CampaignData, CampaignUpdate, Contact, ContactStatus, EmailRecord,
    EmailStatus, NewContact,
};

/// Failure reading or writing a store document.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid contact: {0}")]
    InvalidContact(String),

    #[error("backup not found: {0}")]
    BackupNotFound(String),
}
