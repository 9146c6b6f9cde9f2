// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outbound email transport.
//!
//! [`Mailer`] is the seam between the application and SMTP. [`SmtpMailer`]
//! delivers through `lettre`; [`LogMailer`] only logs and is used when no SMTP
//! host is configured; [`MockMailer`] records messages for tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::models::UserEmailConfig;

/// Errors from building or delivering mail.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MailError {
    /// An address could not be parsed.
    #[error("Invalid address '{address}': {reason}")]
    Address { address: String, reason: String },

    /// The message has no recipients.
    #[error("No recipients")]
    NoRecipients,

    /// The message could not be assembled.
    #[error("Failed to build message: {0}")]
    Build(String),

    /// The SMTP exchange failed.
    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// A message ready to hand to a [`Mailer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub reply_to: Option<String>,
    /// Message id of the email being answered.
    pub in_reply_to: Option<String>,
}

impl OutgoingEmail {
    /// Plain text message to a single recipient.
    pub fn plain(from: &str, to: &str, subject: &str, body: &str) -> Self {
        Self {
            from: from.to_string(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            text_body: body.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver `email`, returning the Message-ID it was sent with.
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailError>;

    /// Open a connection and authenticate without sending anything.
    async fn test_connection(&self) -> Result<bool, MailError>;
}

/// SMTP connection parameters.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// STARTTLS on a plain connection.
    pub use_tls: bool,
    /// Implicit TLS from the first byte.
    pub use_ssl: bool,
    pub timeout: Duration,
}

impl SmtpSettings {
    pub fn from_user_config(config: &UserEmailConfig) -> Self {
        Self {
            host: config.smtp_host.clone(),
            port: u16::try_from(config.smtp_port).unwrap_or(587),
            username: config.smtp_username.clone(),
            password: config.smtp_password.clone(),
            use_tls: config.smtp_use_tls,
            use_ssl: config.smtp_use_ssl,
            timeout: Duration::from_secs(30),
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.trim().parse::<Mailbox>().map_err(|e| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Fresh RFC 5322 message id.
pub fn new_message_id(domain: &str) -> String {
    format!("<{}@{}>", uuid::Uuid::new_v4(), domain)
}

/// Assemble a lettre [`Message`] with the given Message-ID.
pub fn build_message(email: &OutgoingEmail, message_id: &str) -> Result<Message, MailError> {
    if email.to.is_empty() {
        return Err(MailError::NoRecipients);
    }

    let mut builder = Message::builder()
        .from(parse_mailbox(&email.from)?)
        .subject(email.subject.clone())
        .message_id(Some(message_id.to_string()));

    for to in &email.to {
        builder = builder.to(parse_mailbox(to)?);
    }
    for cc in &email.cc {
        builder = builder.cc(parse_mailbox(cc)?);
    }
    for bcc in &email.bcc {
        builder = builder.bcc(parse_mailbox(bcc)?);
    }
    if let Some(reply_to) = &email.reply_to {
        builder = builder.reply_to(parse_mailbox(reply_to)?);
    }
    if let Some(parent) = &email.in_reply_to {
        builder = builder.in_reply_to(parent.clone()).references(parent.clone());
    }

    let message = if email.html_body.is_empty() {
        builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.text_body.clone())
    } else {
        builder.multipart(MultiPart::alternative_plain_html(
            email.text_body.clone(),
            email.html_body.clone(),
        ))
    };
    message.map_err(|e| MailError::Build(e.to_string()))
}

/// Domain part of an address, used for generated message ids.
fn domain_of(address: &str) -> &str {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim_end_matches('>'))
        .filter(|d| !d.is_empty())
        .unwrap_or("mintcrm.local")
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let builder = if settings.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| MailError::Smtp(e.to_string()))?
        } else if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| MailError::Smtp(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };

        let mut builder = builder.port(settings.port).timeout(Some(settings.timeout));
        if !settings.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            host: settings.host.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailError> {
        let message_id = new_message_id(domain_of(&email.from));
        let message = build_message(email, &message_id)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Smtp(e.to_string()))?;
        tracing::debug!(host = %self.host, to = ?email.to, "Email delivered over SMTP");
        Ok(message_id)
    }

    async fn test_connection(&self) -> Result<bool, MailError> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| MailError::Smtp(e.to_string()))
    }
}

/// Mailer that only logs. Used when no SMTP host is configured.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailError> {
        let message_id = new_message_id(domain_of(&email.from));
        build_message(email, &message_id)?;
        tracing::info!(
            to = ?email.to,
            subject = %email.subject,
            message_id = %message_id,
            "SMTP not configured, email logged instead of sent"
        );
        Ok(message_id)
    }

    async fn test_connection(&self) -> Result<bool, MailError> {
        Ok(false)
    }
}

/// In-memory mailer that records every message. Optionally fails every send.
#[derive(Debug, Default, Clone)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    fail: bool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailError> {
        if self.fail {
            return Err(MailError::Smtp("connection refused".into()));
        }
        if email.to.is_empty() {
            return Err(MailError::NoRecipients);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(new_message_id("mock.local"))
    }

    async fn test_connection(&self) -> Result<bool, MailError> {
        Ok(!self.fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_plain_message() {
        let email = OutgoingEmail::plain(
            "MINT CRM <noreply@mintcrm.local>",
            "agent@example.com",
            "Case CASE-000001 assigned to you",
            "Please take a look.",
        );
        let message = build_message(&email, "<abc@mintcrm.local>").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Case CASE-000001 assigned to you"));
        assert!(raw.contains("Message-ID: <abc@mintcrm.local>"));
        assert!(raw.contains("To: agent@example.com"));
    }

    #[test]
    fn test_threading_headers() {
        let mut email = OutgoingEmail::plain("a@example.com", "b@example.com", "Re: hi", "ok");
        email.in_reply_to = Some("<parent@example.com>".into());
        let raw = String::from_utf8(
            build_message(&email, "<child@example.com>")
                .unwrap()
                .formatted(),
        )
        .unwrap();
        assert!(raw.contains("In-Reply-To: <parent@example.com>"));
        assert!(raw.contains("References: <parent@example.com>"));
    }

    #[test]
    fn test_rejects_bad_address_and_empty_recipients() {
        let email = OutgoingEmail::plain("a@example.com", "not an address", "s", "b");
        assert!(matches!(
            build_message(&email, "<x@y>"),
            Err(MailError::Address { .. })
        ));

        let mut email = OutgoingEmail::plain("a@example.com", "b@example.com", "s", "b");
        email.to.clear();
        assert!(matches!(
            build_message(&email, "<x@y>"),
            Err(MailError::NoRecipients)
        ));
    }

    #[test]
    fn test_message_id_domain() {
        assert_eq!(domain_of("Support <help@acme.io>"), "acme.io");
        assert_eq!(domain_of("nobody"), "mintcrm.local");
        assert!(new_message_id("acme.io").ends_with("@acme.io>"));
    }

    #[tokio::test]
    async fn test_mock_mailer_records() {
        let mailer = MockMailer::new();
        mailer
            .send(&OutgoingEmail::plain("a@example.com", "b@example.com", "s", "b"))
            .await
            .unwrap();
        assert_eq!(mailer.sent().len(), 1);
        assert!(MockMailer::failing()
            .send(&OutgoingEmail::plain("a@example.com", "b@example.com", "s", "b"))
            .await
            .is_err());
    }
}
