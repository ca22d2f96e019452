//! lettre-backed SMTP transport.

use std::time::Duration;

use chrono::Utc;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::Error as SmtpError;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, info};

use super::{build_message, MailOptions, SendInfo, TransportError};
use crate::config::SmtpSettings;

/// Connection security for an SMTP port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain connection upgraded with STARTTLS (port 587).
    StartTls,
    /// TLS from the first byte (port 465).
    Implicit,
}

/// Socket timeout for individual SMTP commands.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    port: u16,
    mode: TlsMode,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings, port: u16, mode: TlsMode) -> Result<Self, TransportError> {
        let builder = match mode {
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host),
            TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host),
        }
        .map_err(smtp_error)?;

        let mut builder = builder.port(port).timeout(Some(COMMAND_TIMEOUT));
        if let (Some(user), Some(password)) = (&settings.user, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            host: settings.host.clone(),
            port,
            mode,
        })
    }

    #[cfg(test)]
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    #[cfg(test)]
    pub fn mode(&self) -> TlsMode {
        self.mode
    }

    /// Open a connection and authenticate, bounded by `timeout`.
    pub async fn verify(&self, timeout: Duration) -> Result<(), TransportError> {
        let connected = tokio::time::timeout(timeout, self.transport.test_connection())
            .await
            .map_err(|_| TransportError::Timeout {
                operation: "SMTP verification",
                timeout,
            })?
            .map_err(smtp_error)?;

        if connected {
            debug!(host = %self.host, port = self.port, "smtp_connection_verified");
            Ok(())
        } else {
            Err(TransportError::Smtp {
                code: None,
                message: format!("{}:{} refused the connection check", self.host, self.port),
                transient: true,
            })
        }
    }

    pub async fn send(&self, options: &MailOptions) -> Result<SendInfo, TransportError> {
        let message_id = new_message_id(&options.from);
        let message = build_message(options, &message_id)?;

        let response = self.transport.send(message).await.map_err(smtp_error)?;
        let response_text = format!(
            "{} {}",
            response.code(),
            response.message().collect::<Vec<_>>().join(" ")
        );

        info!(
            to = %options.to,
            message_id = %message_id,
            response = %response_text,
            "smtp_email_sent"
        );

        Ok(SendInfo {
            message_id,
            accepted: vec![options.to.clone()],
            rejected: Vec::new(),
            response: response_text,
        })
    }
}

/// `<millis.random@sender-domain>`
fn new_message_id(from: &str) -> String {
    let domain = from
        .rsplit_once('@')
        .map(|(_, d)| d.trim_end_matches('>'))
        .filter(|d| !d.is_empty())
        .unwrap_or("localhost");
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("<{}.{}@{}>", Utc::now().timestamp_millis(), suffix, domain)
}

fn smtp_error(e: SmtpError) -> TransportError {
    if e.is_timeout() {
        return TransportError::Timeout {
            operation: "SMTP command",
            timeout: COMMAND_TIMEOUT,
        };
    }
    TransportError::Smtp {
        code: e.status().map(|c| c.to_string()),
        transient: e.is_transient(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_uses_sender_domain() {
        let id = new_message_id("contact@baggabugs.dev");
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@baggabugs.dev>"));

        let id = new_message_id("nobody");
        assert!(id.ends_with("@localhost>"));
    }

    #[tokio::test]
    async fn test_new_keeps_port_and_mode() {
        let settings = SmtpSettings {
            host: "smtp.example.com".to_string(),
            user: Some("me@example.com".to_string()),
            password: Some("secret".to_string()),
            ..SmtpSettings::default()
        };
        let mailer = SmtpMailer::new(&settings, 465, TlsMode::Implicit).unwrap();
        assert_eq!(mailer.host(), "smtp.example.com");
        assert_eq!(mailer.port(), 465);
        assert_eq!(mailer.mode(), TlsMode::Implicit);
    }
}
