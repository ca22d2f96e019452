//! Timestamp formatting shared by the store and the rendered emails.
//!
//! Persisted timestamps are ISO-8601 UTC strings with millisecond precision,
//! e.g. `2026-10-16T08:30:00.000Z`.

use chrono::{DateTime, Datelike, SecondsFormat, SubsecRound, Utc};

/// Current time at the precision the store persists.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp, normalizing it to UTC.
pub fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// US short date without zero padding, e.g. `10/6/2026`.
pub fn us_short_date(ts: &DateTime<Utc>) -> String {
    format!("{}/{}/{}", ts.month(), ts.day(), ts.year())
}

/// Serde adapter for `Option<DateTime<Utc>>` fields.
///
/// Values that fail to parse are read back as `None` instead of rejecting
/// the whole document.
pub mod iso_millis_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&super::format_iso(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        Ok(raw
            .as_ref()
            .and_then(|v| v.as_str())
            .and_then(super::parse_iso))
    }
}
