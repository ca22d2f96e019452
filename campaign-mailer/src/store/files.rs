//! Flat-file JSON store.
//!
//! Three documents live under the data directory: `contacts.json`,
//! `emails.json` and `settings.json`. Every mutation is a whole-file
//! read-modify-write. Inside one process those cycles are serialized by an
//! async mutex; across processes the last writer wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::types::{AppSettings, Contact, EmailRecord};
use super::StoreError;

pub const CONTACTS_FILE: &str = "contacts.json";
pub const EMAILS_FILE: &str = "emails.json";
pub const SETTINGS_FILE: &str = "settings.json";

/// Handle to the data directory. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl Store {
    /// Create a store rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                dir: dir.into(),
                write_lock: Mutex::new(()),
            }),
        }
    }

    // =========================================================================
    // Contacts
    // =========================================================================

    pub async fn load_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        self.read_or_default(CONTACTS_FILE).await
    }

    pub async fn save_contacts(&self, contacts: &[Contact]) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        self.write_json(CONTACTS_FILE, &contacts).await?;
        info!(count = contacts.len(), "contacts_saved");
        Ok(())
    }

    /// Load, mutate and save the contact list as one step.
    pub async fn update_contacts<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<Contact>) -> T,
    {
        let _guard = self.inner.write_lock.lock().await;
        let mut contacts: Vec<Contact> = self.read_or_default(CONTACTS_FILE).await?;
        let out = f(&mut contacts);
        self.write_json(CONTACTS_FILE, &contacts).await?;
        debug!(count = contacts.len(), "contacts_updated");
        Ok(out)
    }

    // =========================================================================
    // Email records
    // =========================================================================

    pub async fn load_email_records(&self) -> Result<Vec<EmailRecord>, StoreError> {
        self.read_or_default(EMAILS_FILE).await
    }

    pub async fn save_email_records(&self, records: &[EmailRecord]) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        self.write_json(EMAILS_FILE, &records).await?;
        info!(count = records.len(), "email_records_saved");
        Ok(())
    }

    /// Load, mutate and save the email record log as one step.
    pub async fn update_email_records<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<EmailRecord>) -> T,
    {
        let _guard = self.inner.write_lock.lock().await;
        let mut records: Vec<EmailRecord> = self.read_or_default(EMAILS_FILE).await?;
        let out = f(&mut records);
        self.write_json(EMAILS_FILE, &records).await?;
        Ok(out)
    }

    /// Append records to the log, assigning ids to those without one.
    pub async fn append_email_records(
        &self,
        mut new_records: Vec<EmailRecord>,
    ) -> Result<(), StoreError> {
        if new_records.is_empty() {
            return Ok(());
        }
        for record in &mut new_records {
            if record.id.is_empty() {
                record.id = new_record_id();
            }
        }
        let added = new_records.len();
        self.update_email_records(move |records| records.extend(new_records))
            .await?;
        info!(added = added, "email_records_appended");
        Ok(())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub async fn load_settings(&self) -> Result<AppSettings, StoreError> {
        let settings: AppSettings = self.read_or_default(SETTINGS_FILE).await?;
        Ok(settings.normalized())
    }

    /// Persist settings, filling blank fields with defaults. Returns what was
    /// written.
    pub async fn save_settings(&self, settings: AppSettings) -> Result<AppSettings, StoreError> {
        let settings = settings.normalized();
        let _guard = self.inner.write_lock.lock().await;
        self.write_json(SETTINGS_FILE, &settings).await?;
        info!(
            team_lead_name = %settings.team_lead_name,
            realtime_tracking = settings.realtime_tracking,
            "settings_saved"
        );
        Ok(settings)
    }

    pub async fn reset_settings(&self) -> Result<AppSettings, StoreError> {
        info!("settings_reset");
        self.save_settings(AppSettings::default()).await
    }

    // =========================================================================
    // File plumbing
    // =========================================================================

    pub(crate) fn path(&self, name: &str) -> PathBuf {
        self.inner.dir.join(name)
    }

    async fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.inner.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.inner.dir.clone(),
                source,
            })
    }

    /// Read a JSON document; a missing file yields the type's default.
    async fn read_or_default<T>(&self, name: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path(name);
        match read_json(&path).await {
            Err(StoreError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "store_file_missing");
                Ok(T::default())
            }
            other => other,
        }
    }

    /// Pretty-print `value` into `name`, going through a temporary file so
    /// readers never observe a partial document.
    pub(crate) async fn write_json<T>(&self, name: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        self.ensure_dir().await?;
        let path = self.path(name);
        write_json_atomic(&path, value).await
    }
}

pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let raw = fs::read(path).await.map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_json_atomic<T>(path: &Path, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &body)
        .await
        .map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
    fs::rename(&tmp, path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// `email_<unix-millis>_<9 random alphanumerics>`.
pub fn new_record_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("email_{}_{}", Utc::now().timestamp_millis(), suffix)
}
