//! Contact list operations on top of the flat-file store.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::files::{new_record_id, Store};
use super::types::{next_contact_id, Contact, EmailRecord, EmailStatus, NewContact};
use super::StoreError;
use crate::util::is_valid_email;

/// Number of contacts touched by a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactChange {
    pub affected: usize,
}

impl Store {
    /// All contacts, most recent activity first; untouched contacts keep
    /// their file order at the end.
    pub async fn list_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        let mut contacts = self.load_contacts().await?;
        contacts.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        Ok(contacts)
    }

    #[cfg(test)]
    pub async fn find_contact(&self, id: &str) -> Result<Option<Contact>, StoreError> {
        let contacts = self.load_contacts().await?;
        Ok(contacts.into_iter().find(|c| c.id == id))
    }

    /// Add one pending contact.
    pub async fn add_contact(&self, data: NewContact) -> Result<Contact, StoreError> {
        let mut added = self.add_contacts(vec![data]).await?;
        added
            .pop()
            .ok_or_else(|| StoreError::InvalidContact("nothing added".to_string()))
    }

    /// Add pending contacts with consecutive ids. The whole batch is rejected
    /// if any email is malformed.
    pub async fn add_contacts(&self, batch: Vec<NewContact>) -> Result<Vec<Contact>, StoreError> {
        if let Some(bad) = batch.iter().find(|c| !is_valid_email(c.email.trim())) {
            return Err(StoreError::InvalidContact(format!(
                "invalid email address: {:?}",
                bad.email
            )));
        }

        let added = self
            .update_contacts(move |contacts| {
                let mut next_id = next_contact_id(contacts);
                let mut added = Vec::with_capacity(batch.len());
                for mut data in batch {
                    data.email = data.email.trim().to_string();
                    let contact = Contact::new(next_id.to_string(), data);
                    next_id += 1;
                    contacts.push(contact.clone());
                    added.push(contact);
                }
                added
            })
            .await?;

        info!(added = added.len(), "contacts_added");
        Ok(added)
    }

    pub async fn delete_contacts(&self, ids: &[String]) -> Result<ContactChange, StoreError> {
        let affected = self
            .update_contacts(|contacts| {
                let before = contacts.len();
                contacts.retain(|c| !ids.contains(&c.id));
                before - contacts.len()
            })
            .await?;

        info!(requested = ids.len(), deleted = affected, "contacts_deleted");
        Ok(ContactChange { affected })
    }

    /// Trim and normalize casing of the selected contacts.
    pub async fn clean_contacts(&self, ids: &[String]) -> Result<ContactChange, StoreError> {
        let affected = self
            .update_contacts(|contacts| {
                let mut count = 0;
                for contact in contacts.iter_mut().filter(|c| ids.contains(&c.id)) {
                    contact.clean();
                    count += 1;
                }
                count
            })
            .await?;

        info!(cleaned = affected, "contacts_cleaned");
        Ok(ContactChange { affected })
    }

    /// Mark a contact opened if it is currently Sent and log the open on its
    /// send record. Returns whether anything changed.
    pub async fn record_open(&self, contact_id: &str, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let opened = self
            .update_contacts(|contacts| {
                let contact = contacts.iter_mut().find(|c| c.id == contact_id)?;
                if contact.mark_opened(at) {
                    Some(contact.clone())
                } else {
                    info!(
                        contact_id = %contact_id,
                        status = ?contact.status,
                        "tracking_open_ignored"
                    );
                    None
                }
            })
            .await?;

        let Some(contact) = opened else {
            return Ok(false);
        };

        info!(contact_id = %contact.id, email = %contact.email, "contact_opened");

        // The contact update already landed; a failed record write is only logged.
        if let Err(e) = self.mark_record_opened(&contact, at).await {
            warn!(contact_id = %contact.id, error = %e, "email_record_open_failed");
        }

        Ok(true)
    }

    async fn mark_record_opened(&self, contact: &Contact, at: DateTime<Utc>) -> Result<(), StoreError> {
        let contact = contact.clone();
        self.update_email_records(move |records| {
            let latest = records
                .iter_mut()
                .filter(|r| r.contact_id == contact.id && r.status == EmailStatus::Sent)
                .max_by_key(|r| r.sent_at);

            match latest {
                Some(record) => {
                    record.status = EmailStatus::Opened;
                    record.opened_at = Some(at);
                }
                None => {
                    let mut record = EmailRecord::sent(
                        new_record_id(),
                        &contact,
                        String::new(),
                        contact.sent_timestamp.unwrap_or(at),
                        None,
                    );
                    record.status = EmailStatus::Opened;
                    record.opened_at = Some(at);
                    records.push(record);
                }
            }
        })
        .await
    }
}
