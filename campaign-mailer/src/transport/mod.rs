//! Mail transport: a lettre SMTP client or an in-memory mock behind one
//! `Mailer` type.
//!
//! ## Start-up
//!
//! ```text
//! FORCE_MOCK_EMAIL / no credentials ──────────────────────────► Mock
//! explicit SMTP_PORT → 587 STARTTLS → 465 TLS (10s verify each) ─► Smtp
//!                                         all failed ────────────► Mock
//! ```

pub mod mock;
pub mod smtp;

use std::time::Duration;

use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::{Address, Message};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

pub use mock::{MockEmail, MockMailer};
pub use smtp::{SmtpMailer, TlsMode};

/// Timeout applied to each SMTP connection check.
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Types
// =============================================================================

/// A single outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub struct MailOptions {
    pub from_name: Option<String>,
    pub from: String,
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
}

/// What the transport reports back for an accepted message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInfo {
    pub message_id: String,
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub response: String,
}

/// Health of the mail service as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStatus {
    Initializing,
    Ready,
    MockReady,
    ConnectionFailed,
    VerificationFailed,
}

impl TransportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportStatus::Initializing => "initializing",
            TransportStatus::Ready => "ready",
            TransportStatus::MockReady => "mock_ready",
            TransportStatus::ConnectionFailed => "connection_failed",
            TransportStatus::VerificationFailed => "verification_failed",
        }
    }

    /// True when sends can be attempted.
    pub fn is_usable(self) -> bool {
        matches!(self, TransportStatus::Ready | TransportStatus::MockReady)
    }
}

impl std::fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid email address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {message}")]
    Smtp {
        code: Option<String>,
        message: String,
        transient: bool,
    },

    #[error("{operation} timed out after {} seconds", .timeout.as_secs())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("recipient rejected: {0}")]
    Rejected(String),

    #[error("email service not available ({0})")]
    NotReady(TransportStatus),
}

impl TransportError {
    /// SMTP reply code, when the server gave one.
    pub fn code(&self) -> Option<&str> {
        match self {
            TransportError::Smtp { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Connection-level failures that are worth another attempt.
    pub fn is_retriable(&self) -> bool {
        match self {
            TransportError::Timeout { .. } => true,
            TransportError::Smtp {
                code, transient, ..
            } => *transient || code.is_none(),
            _ => false,
        }
    }

    /// Status to report when a verification fails with this error.
    pub fn verify_status(&self) -> TransportStatus {
        if self.is_retriable() {
            TransportStatus::ConnectionFailed
        } else {
            TransportStatus::VerificationFailed
        }
    }
}

// =============================================================================
// Mailer
// =============================================================================

/// The active transport.
pub enum Mailer {
    Smtp(SmtpMailer),
    Mock(MockMailer),
}

impl Mailer {
    pub async fn verify(&self) -> Result<(), TransportError> {
        match self {
            Mailer::Smtp(smtp) => smtp.verify(VERIFY_TIMEOUT).await,
            Mailer::Mock(_) => Ok(()),
        }
    }

    pub async fn send(&self, options: &MailOptions) -> Result<SendInfo, TransportError> {
        match self {
            Mailer::Smtp(smtp) => smtp.send(options).await,
            Mailer::Mock(mock) => mock.send(options).await,
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, Mailer::Mock(_))
    }

    pub fn as_mock(&self) -> Option<&MockMailer> {
        match self {
            Mailer::Mock(mock) => Some(mock),
            Mailer::Smtp(_) => None,
        }
    }

    /// Status right after start-up.
    pub fn initial_status(&self) -> TransportStatus {
        match self {
            Mailer::Smtp(_) => TransportStatus::Ready,
            Mailer::Mock(_) => TransportStatus::MockReady,
        }
    }
}

/// Pick a transport from the configuration, verifying SMTP candidates in
/// order and falling back to the mock.
pub async fn init_mailer(config: &Config) -> Mailer {
    let mock = || {
        Mailer::Mock(MockMailer::new(Duration::from_millis(
            config.mock_send_delay_ms,
        )))
    };

    if config.force_mock_email {
        info!("mock_email_forced");
        return mock();
    }
    if !config.smtp.has_credentials() {
        warn!(host = %config.smtp.host, "smtp_credentials_missing_using_mock");
        return mock();
    }

    for (port, mode) in smtp_candidates(config.smtp.port) {
        let mailer = match SmtpMailer::new(&config.smtp, port, mode) {
            Ok(m) => m,
            Err(e) => {
                warn!(host = %config.smtp.host, port = port, error = %e, "smtp_transport_build_failed");
                continue;
            }
        };

        match mailer.verify(VERIFY_TIMEOUT).await {
            Ok(()) => {
                info!(
                    host = %config.smtp.host,
                    port = port,
                    mode = ?mode,
                    sender = config.smtp.sender().unwrap_or_default(),
                    "smtp_ready"
                );
                return Mailer::Smtp(mailer);
            }
            Err(e) => {
                warn!(host = %config.smtp.host, port = port, mode = ?mode, error = %e, "smtp_verify_failed");
            }
        }
    }

    warn!("all_smtp_configurations_failed_using_mock");
    mock()
}

/// Ports to try, in order: an explicit port first, then whichever of 587
/// and 465 it was not.
fn smtp_candidates(explicit: Option<u16>) -> Vec<(u16, TlsMode)> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(port) = explicit {
        candidates.push((port, tls_mode_for(port)));
    }
    for port in [587, 465] {
        if explicit != Some(port) {
            candidates.push((port, tls_mode_for(port)));
        }
    }
    candidates
}

/// 465 speaks TLS from the first byte; every other port upgrades.
fn tls_mode_for(port: u16) -> TlsMode {
    if port == 465 {
        TlsMode::Implicit
    } else {
        TlsMode::StartTls
    }
}

// =============================================================================
// Message building
// =============================================================================

fn parse_address(raw: &str) -> Result<Address, TransportError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| TransportError::InvalidAddress {
            address: raw.to_string(),
            reason: e.to_string(),
        })
}

fn parse_mailbox(raw: &str) -> Result<Mailbox, TransportError> {
    raw.trim()
        .parse::<Mailbox>()
        .map_err(|e| TransportError::InvalidAddress {
            address: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Build a MIME message with an HTML part and, when given, a plain-text
/// alternative.
pub fn build_message(options: &MailOptions, message_id: &str) -> Result<Message, TransportError> {
    let from = Mailbox::new(options.from_name.clone(), parse_address(&options.from)?);
    let mut builder = Message::builder()
        .from(from)
        .to(parse_mailbox(&options.to)?)
        .subject(options.subject.clone())
        .message_id(Some(message_id.to_string()))
        .date_now();

    if let Some(reply_to) = options.reply_to.as_deref().filter(|r| !r.trim().is_empty()) {
        builder = builder.reply_to(parse_mailbox(reply_to)?);
    }

    let built = match options.text.as_deref().filter(|t| !t.is_empty()) {
        Some(text) => builder.multipart(MultiPart::alternative_plain_html(
            text.to_string(),
            options.html.clone(),
        )),
        None => builder.singlepart(SinglePart::html(options.html.clone())),
    };

    built.map_err(|e| TransportError::Build(e.to_string()))
}
