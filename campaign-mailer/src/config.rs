//! Configuration module for environment variable parsing.
//!
//! Both binaries read the same `Config`; each uses the fields it needs.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Dashboard
    // =========================================================================
    /// Port for the dashboard server
    pub port: u16,

    /// Directory holding contacts.json, emails.json and settings.json
    pub data_dir: PathBuf,

    /// Base URL of the relay service
    pub backend_url: String,

    /// Public base URL of the dashboard, used in tracking pixel links
    pub public_base_url: String,

    /// Timeout for bulk and single sends through the relay
    pub relay_timeout_ms: u64,

    /// Timeout for relay health checks
    pub health_timeout_ms: u64,

    // =========================================================================
    // Relay
    // =========================================================================
    /// Port for the relay server
    pub relay_port: u16,

    /// SMTP server settings; absent credentials select the mock transport
    pub smtp: SmtpSettings,

    /// Skip SMTP entirely and use the mock transport
    pub force_mock_email: bool,

    /// Artificial latency of each mock send
    pub mock_send_delay_ms: u64,

    /// Emails sent concurrently per bulk batch
    pub bulk_concurrency: usize,

    /// Pause between bulk batches
    pub bulk_batch_delay_ms: u64,

    /// Pause between test-email attempts
    pub test_email_retry_delay_ms: u64,
}

/// SMTP connection settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    /// Explicit port; when unset both 587 and 465 are tried.
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from_email: Option<String>,
}

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

impl SmtpSettings {
    /// True when both user and password are present.
    pub fn has_credentials(&self) -> bool {
        self.user.as_deref().is_some_and(|u| !u.is_empty())
            && self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Address used as the sender; falls back to the SMTP user.
    pub fn sender(&self) -> Option<&str> {
        self.from_email
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.user.as_deref().filter(|s| !s.is_empty()))
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_or("PORT", 9002),

            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),

            backend_url: parse_url("BACKEND_URL", "http://localhost:9000"),

            public_base_url: parse_url("PUBLIC_BASE_URL", "http://localhost:9002"),

            relay_timeout_ms: parse_or("RELAY_TIMEOUT_MS", 60_000),

            health_timeout_ms: parse_or("HEALTH_TIMEOUT_MS", 10_000),

            relay_port: parse_or("RELAY_PORT", 9000),

            smtp: SmtpSettings {
                host: non_empty("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                port: parse_opt("SMTP_PORT"),
                user: non_empty("SMTP_USER"),
                password: non_empty("SMTP_PASSWORD"),
                from_email: non_empty("SMTP_FROM_EMAIL"),
            },

            force_mock_email: parse_bool("FORCE_MOCK_EMAIL", false),

            mock_send_delay_ms: parse_or("MOCK_SEND_DELAY_MS", 500),

            bulk_concurrency: parse_or::<usize>("BULK_CONCURRENCY", 3).max(1),

            bulk_batch_delay_ms: parse_or("BULK_BATCH_DELAY_MS", 200),

            test_email_retry_delay_ms: parse_or("TEST_EMAIL_RETRY_DELAY_MS", 3000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 9002,
            data_dir: PathBuf::from("data"),
            backend_url: "http://localhost:9000".to_string(),
            public_base_url: "http://localhost:9002".to_string(),
            relay_timeout_ms: 60_000,
            health_timeout_ms: 10_000,
            relay_port: 9000,
            smtp: SmtpSettings {
                host: DEFAULT_SMTP_HOST.to_string(),
                ..SmtpSettings::default()
            },
            force_mock_email: false,
            mock_send_delay_ms: 500,
            bulk_concurrency: 3,
            bulk_batch_delay_ms: 200,
            test_email_retry_delay_ms: 3000,
        }
    }
}

/// Parse a variable, warning and falling back on malformed input.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };
    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Parse an optional variable; unset or blank is `None`, malformed warns.
fn parse_opt<T: FromStr>(name: &str) -> Option<T> {
    let raw = non_empty(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, ignoring");
            None
        }
    }
}

/// Accepts true/false, 1/0, yes/no and on/off in any case.
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" | "" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

/// Read a base URL, dropping any trailing slash.
fn parse_url(name: &str, default: &str) -> String {
    let raw = non_empty(name).unwrap_or_else(|| default.to_string());
    match url::Url::parse(&raw) {
        Ok(_) => raw.trim_end_matches('/').to_string(),
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid URL, using default");
            default.to_string()
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
