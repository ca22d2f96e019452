//! Dashboard counters derived from the contact list.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::store::export::percentage;
use crate::store::{Contact, ContactStatus};
use crate::util::time::iso_millis_opt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total: usize,
    /// Sent or opened.
    pub sent: usize,
    pub pending: usize,
    pub errors: usize,
    pub opened: usize,
    pub open_rate: f64,
    pub sent_rate: f64,
}

impl Analytics {
    pub fn of(contacts: &[Contact]) -> Self {
        let count = |status: ContactStatus| contacts.iter().filter(|c| c.status == status).count();
        let total = contacts.len();
        let sent = contacts.iter().filter(|c| c.status.was_sent()).count();
        let opened = count(ContactStatus::Opened);

        Self {
            total,
            sent,
            pending: count(ContactStatus::Pending),
            errors: count(ContactStatus::Error),
            opened,
            open_rate: percentage(opened, sent),
            sent_rate: percentage(sent, total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentOpen {
    pub email: String,
    #[serde(with = "iso_millis_opt")]
    pub opened_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStats {
    pub total_sent: usize,
    pub total_opened: usize,
    pub open_rate: f64,
    pub recent_opens: usize,
    pub last24_hours: Vec<RecentOpen>,
    #[serde(with = "iso_millis_opt")]
    pub last_open: Option<DateTime<Utc>>,
}

impl TrackingStats {
    /// Open statistics; "recent" means within 24 hours before `now`.
    pub fn of(contacts: &[Contact], now: DateTime<Utc>) -> Self {
        let cutoff = now - Duration::hours(24);
        let total_sent = contacts.iter().filter(|c| c.status.was_sent()).count();
        let total_opened = contacts
            .iter()
            .filter(|c| c.status == ContactStatus::Opened)
            .count();

        let mut recent: Vec<RecentOpen> = contacts
            .iter()
            .filter(|c| c.open_timestamp.is_some_and(|t| t > cutoff))
            .map(|c| RecentOpen {
                email: c.email.clone(),
                opened_at: c.open_timestamp,
            })
            .collect();
        recent.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));

        Self {
            total_sent,
            total_opened,
            open_rate: percentage(total_opened, total_sent),
            recent_opens: recent.len(),
            last_open: contacts.iter().filter_map(|c| c.open_timestamp).max(),
            last24_hours: recent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewContact;

    fn contacts(now: DateTime<Utc>) -> Vec<Contact> {
        let mut list: Vec<Contact> = (1..=5)
            .map(|n| {
                Contact::new(
                    n.to_string(),
                    NewContact {
                        first_name: format!("User{n}"),
                        last_name: String::new(),
                        email: format!("user{n}@example.com"),
                    },
                )
            })
            .collect();
        list[0].mark_sent(now - Duration::days(3));
        list[0].mark_opened(now - Duration::days(2));
        list[1].mark_sent(now - Duration::hours(3));
        list[1].mark_opened(now - Duration::hours(2));
        list[2].mark_sent(now - Duration::hours(1));
        list[3].mark_error();
        list
    }

    #[test]
    fn test_analytics_counts_and_rates() {
        let analytics = Analytics::of(&contacts(crate::util::now()));
        assert_eq!(
            analytics,
            Analytics {
                total: 5,
                sent: 3,
                pending: 1,
                errors: 1,
                opened: 2,
                open_rate: 66.67,
                sent_rate: 60.0,
            }
        );
    }

    #[test]
    fn test_analytics_empty() {
        let analytics = Analytics::of(&[]);
        assert_eq!(analytics.open_rate, 0.0);
        assert_eq!(analytics.sent_rate, 0.0);
    }

    #[test]
    fn test_tracking_stats_recent_window() {
        let now = crate::util::now();
        let stats = TrackingStats::of(&contacts(now), now);

        assert_eq!(stats.total_sent, 3);
        assert_eq!(stats.total_opened, 2);
        assert_eq!(stats.recent_opens, 1);
        assert_eq!(stats.last24_hours[0].email, "user2@example.com");
        assert_eq!(stats.last_open, Some(now - Duration::hours(2)));

        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("last24Hours").is_some());
    }
}
