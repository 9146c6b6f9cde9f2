// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Delivery of recorded emails.
//!
//! An [`Email`] row is written before anything goes over the wire. Delivery
//! then marks it sent or failed and appends an email log entry, so the table
//! is the audit trail for every outbound message.

use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;

use super::mailer::{Mailer, OutgoingEmail, SmtpMailer, SmtpSettings};
use crate::db;
use crate::models::{Email, EmailEvent, EmailStatus, EmailType, NewEmail, split_addresses};

#[derive(Clone)]
pub struct EmailService {
    pool: PgPool,
    default_mailer: Arc<dyn Mailer>,
    from_email: String,
}

/// Which transport carried a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    UserConfig,
    DefaultConfig,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::UserConfig => "user_config",
            Method::DefaultConfig => "default_config",
        }
    }
}

impl EmailService {
    pub fn new(
        pool: PgPool,
        default_mailer: Arc<dyn Mailer>,
        from_email: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            default_mailer,
            from_email: from_email.into(),
        }
    }

    pub fn from_email(&self) -> &str {
        &self.from_email
    }

    pub fn default_mailer(&self) -> &Arc<dyn Mailer> {
        &self.default_mailer
    }

    /// The owner's verified SMTP config when there is one, else the default mailer.
    async fn mailer_for(&self, user_id: Option<i64>) -> crate::Result<(Arc<dyn Mailer>, Method)> {
        let Some(user_id) = user_id else {
            return Ok((self.default_mailer.clone(), Method::DefaultConfig));
        };
        if let Some(config) = db::email_configs::get_sending_config(&self.pool, user_id).await? {
            match SmtpMailer::new(&SmtpSettings::from_user_config(&config)) {
                Ok(mailer) => return Ok((Arc::new(mailer), Method::UserConfig)),
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        error = %e,
                        "Unusable SMTP config, using default mailer"
                    );
                }
            }
        }
        Ok((self.default_mailer.clone(), Method::DefaultConfig))
    }

    /// Record a new outbound email and deliver it.
    pub async fn create_and_send(&self, mut input: NewEmail) -> crate::Result<Email> {
        if input.from_email.is_empty() {
            input.from_email = self.sender_for(input.user_id).await?;
        }
        input.status = EmailStatus::Queued;
        let email = db::emails::create_email(&self.pool, &input).await?;
        db::emails::add_log(&self.pool, email.id, EmailEvent::Created, &json!({})).await?;
        self.deliver(&email).await
    }

    /// Sender address for mail owned by `user_id`.
    async fn sender_for(&self, user_id: Option<i64>) -> crate::Result<String> {
        let Some(user_id) = user_id else {
            return Ok(self.from_email.clone());
        };
        if let Some(config) = db::email_configs::get_sending_config(&self.pool, user_id).await? {
            return Ok(if config.display_name.is_empty() {
                config.email_address
            } else {
                format!("{} <{}>", config.display_name, config.email_address)
            });
        }
        Ok(self.from_email.clone())
    }

    /// Send a recorded email. On failure the row is marked failed, the
    /// failure is logged and the mail error is returned.
    pub async fn deliver(&self, email: &Email) -> crate::Result<Email> {
        let (mailer, method) = self.mailer_for(email.user_id).await?;
        let outgoing = outgoing_from_record(email);

        match mailer.send(&outgoing).await {
            Ok(message_id) => {
                let sent = db::emails::mark_sent(&self.pool, email.id, Some(&message_id))
                    .await?
                    .ok_or(crate::Error::NotFound("Email"))?;
                db::emails::add_log(
                    &self.pool,
                    email.id,
                    EmailEvent::Sent,
                    &json!({ "method": method.as_str(), "message_id": message_id }),
                )
                .await?;
                tracing::info!(email_id = email.id, method = method.as_str(), "Email sent");
                Ok(sent)
            }
            Err(e) => {
                db::emails::mark_failed(&self.pool, email.id, &e.to_string()).await?;
                db::emails::add_log(
                    &self.pool,
                    email.id,
                    EmailEvent::Failed,
                    &json!({ "error": e.to_string(), "method": method.as_str() }),
                )
                .await?;
                tracing::warn!(email_id = email.id, error = %e, "Email delivery failed");
                Err(e.into())
            }
        }
    }

    /// Record a system email to a single recipient and send it.
    pub async fn send_system_email(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: &str,
        case_id: Option<i64>,
        user_id: Option<i64>,
    ) -> crate::Result<Email> {
        self.create_and_send(NewEmail {
            email_type: EmailType::System,
            subject: subject.to_string(),
            from_email: self.from_email.clone(),
            to_emails: to.to_string(),
            text_content: text.to_string(),
            html_content: html.to_string(),
            case_id,
            user_id,
            ..Default::default()
        })
        .await
    }
}

/// Map a stored email onto the transport type.
pub fn outgoing_from_record(email: &Email) -> OutgoingEmail {
    let owned = |list: &str| split_addresses(list).into_iter().map(String::from).collect();
    OutgoingEmail {
        from: email.from_email.clone(),
        to: owned(&email.to_emails),
        cc: owned(&email.cc_emails),
        bcc: owned(&email.bcc_emails),
        subject: email.subject.clone(),
        text_body: email.text_content.clone(),
        html_body: email.html_content.clone(),
        reply_to: None,
        in_reply_to: email.reply_to.clone(),
    }
}

/// Subject with a single `Re: ` prefix.
pub fn reply_subject(subject: &str) -> String {
    if subject.to_lowercase().starts_with("re:") {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

/// Body of a forwarded message: the optional note followed by the quoted original.
pub fn forward_body(original: &Email, note: Option<&str>) -> String {
    let mut body = String::new();
    if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
        body.push_str(note);
        body.push_str("\n\n");
    }
    body.push_str("---------- Forwarded message ----------\n");
    body.push_str(&format!("From: {}\n", original.from_email));
    let date = original.sent_at.unwrap_or(original.created_at);
    body.push_str(&format!("Date: {}\n", date.format("%Y-%m-%d %H:%M UTC")));
    body.push_str(&format!("Subject: {}\n", original.subject));
    body.push_str(&format!("To: {}\n\n", original.to_emails));
    body.push_str(&original.text_content);
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn stored() -> Email {
        Email {
            id: 3,
            email_type: EmailType::Inbound,
            status: EmailStatus::Delivered,
            subject: "Invoice question".into(),
            from_email: "customer@example.com".into(),
            to_emails: "support@example.com, sales@example.com".into(),
            cc_emails: "boss@example.com".into(),
            bcc_emails: String::new(),
            html_content: String::new(),
            text_content: "Why was I charged twice?".into(),
            template_id: None,
            case_id: None,
            user_id: Some(1),
            message_id: Some("<orig@example.com>".into()),
            thread_id: None,
            reply_to: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
            sent_at: None,
            delivered_at: None,
            opened_at: None,
            clicked_at: None,
            error_message: String::new(),
            retry_count: 0,
            max_retries: 3,
            is_starred: false,
            is_archived: false,
            is_read: false,
        }
    }

    #[test]
    fn test_outgoing_from_record_splits_lists() {
        let out = outgoing_from_record(&stored());
        assert_eq!(out.to, vec!["support@example.com", "sales@example.com"]);
        assert_eq!(out.cc, vec!["boss@example.com"]);
        assert!(out.bcc.is_empty());
    }

    #[test]
    fn test_reply_subject_prefix_once() {
        assert_eq!(reply_subject("Hello"), "Re: Hello");
        assert_eq!(reply_subject("Re: Hello"), "Re: Hello");
        assert_eq!(reply_subject("RE: Hello"), "RE: Hello");
    }

    #[test]
    fn test_forward_body_quotes_original() {
        let body = forward_body(&stored(), Some("FYI"));
        assert!(body.starts_with("FYI\n\n---------- Forwarded message ----------"));
        assert!(body.contains("From: customer@example.com"));
        assert!(body.contains("Date: 2025-03-01 09:30 UTC"));
        assert!(body.ends_with("Why was I charged twice?"));

        let bare = forward_body(&stored(), None);
        assert!(bare.starts_with("---------- Forwarded message"));
    }
}
