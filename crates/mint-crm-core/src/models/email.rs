// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Email records, delivery log, templates and per-user SMTP settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crm_enum! {
    pub enum EmailType {
        #[default]
        Outbound => ("outbound", "Outbound"),
        Inbound => ("inbound", "Inbound"),
        System => ("system", "System"),
    }
}

crm_enum! {
    /// Delivery state of an email.
    pub enum EmailStatus {
        #[default]
        Draft => ("draft", "Draft"),
        Queued => ("queued", "Queued"),
        Sent => ("sent", "Sent"),
        Delivered => ("delivered", "Delivered"),
        Failed => ("failed", "Failed"),
        Bounced => ("bounced", "Bounced"),
    }
}

crm_enum! {
    pub enum EmailEvent {
        #[default]
        Created => ("created", "Created"),
        Queued => ("queued", "Queued"),
        Sent => ("sent", "Sent"),
        Delivered => ("delivered", "Delivered"),
        Opened => ("opened", "Opened"),
        Clicked => ("clicked", "Clicked"),
        Bounced => ("bounced", "Bounced"),
        Failed => ("failed", "Failed"),
    }
}

crm_enum! {
    /// Purpose of a message template. SMS templates use the same set minus `password_reset`.
    pub enum TemplateType {
        CaseAssignment => ("case_assignment", "Case Assignment"),
        CaseResponse => ("case_response", "Case Response"),
        CaseEscalation => ("case_escalation", "Case Escalation"),
        CaseResolution => ("case_resolution", "Case Resolution"),
        Welcome => ("welcome", "Welcome"),
        PasswordReset => ("password_reset", "Password Reset"),
        Notification => ("notification", "Notification"),
        #[default]
        Custom => ("custom", "Custom"),
    }
}

crm_enum! {
    pub enum EmailProvider {
        Gmail => ("gmail", "Gmail"),
        Outlook => ("outlook", "Outlook"),
        Yahoo => ("yahoo", "Yahoo"),
        #[default]
        Custom => ("custom", "Custom SMTP/IMAP"),
    }
}

/// Connection defaults for a mail provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderDefaults {
    pub provider: EmailProvider,
    pub name: &'static str,
    pub smtp_host: &'static str,
    pub smtp_port: i32,
    pub smtp_use_tls: bool,
    pub imap_host: &'static str,
    pub imap_port: i32,
    pub imap_use_ssl: bool,
}

impl EmailProvider {
    pub fn defaults(&self) -> ProviderDefaults {
        let (smtp_host, imap_host) = match self {
            EmailProvider::Gmail => ("smtp.gmail.com", "imap.gmail.com"),
            EmailProvider::Outlook => ("smtp-mail.outlook.com", "outlook.office365.com"),
            EmailProvider::Yahoo => ("smtp.mail.yahoo.com", "imap.mail.yahoo.com"),
            EmailProvider::Custom => ("", ""),
        };
        ProviderDefaults {
            provider: *self,
            name: self.label(),
            smtp_host,
            smtp_port: 587,
            smtp_use_tls: true,
            imap_host,
            imap_port: 993,
            imap_use_ssl: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Email {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub email_type: EmailType,
    #[sqlx(try_from = "String")]
    pub status: EmailStatus,
    pub subject: String,
    pub from_email: String,
    /// Comma separated.
    pub to_emails: String,
    pub cc_emails: String,
    pub bcc_emails: String,
    pub html_content: String,
    pub text_content: String,
    pub template_id: Option<i64>,
    pub case_id: Option<i64>,
    pub user_id: Option<i64>,
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
    pub reply_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub error_message: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub is_starred: bool,
    pub is_archived: bool,
    pub is_read: bool,
}

impl Email {
    pub fn is_sent(&self) -> bool {
        matches!(self.status, EmailStatus::Sent | EmailStatus::Delivered)
    }

    /// Failed and still under the retry budget.
    pub fn can_retry(&self) -> bool {
        self.status == EmailStatus::Failed && self.retry_count < self.max_retries
    }

    pub fn recipients(&self) -> Vec<&str> {
        split_addresses(&self.to_emails)
    }
}

/// Splits a comma separated address list, dropping blanks.
pub fn split_addresses(list: &str) -> Vec<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Fields for recording a new email.
#[derive(Debug, Clone, Default)]
pub struct NewEmail {
    pub email_type: EmailType,
    pub status: EmailStatus,
    pub subject: String,
    pub from_email: String,
    pub to_emails: String,
    pub cc_emails: String,
    pub bcc_emails: String,
    pub html_content: String,
    pub text_content: String,
    pub template_id: Option<i64>,
    pub case_id: Option<i64>,
    pub user_id: Option<i64>,
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailFilter {
    pub email_type: Option<EmailType>,
    pub status: Option<EmailStatus>,
    pub case: Option<i64>,
    pub is_starred: Option<bool>,
    pub is_archived: Option<bool>,
    pub is_read: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmailLog {
    pub id: i64,
    pub email_id: i64,
    #[sqlx(try_from = "String")]
    pub event: EmailEvent,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmailTemplate {
    pub id: i64,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub template_type: TemplateType,
    pub subject: String,
    pub html_content: String,
    pub text_content: String,
    pub variables: serde_json::Value,
    pub is_active: bool,
    pub created_by_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subject and bodies produced by rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_content: String,
    pub text_content: String,
}

impl EmailTemplate {
    pub fn render(&self, context: &serde_json::Value) -> RenderedEmail {
        RenderedEmail {
            subject: crate::templating::render(&self.subject, context),
            html_content: crate::templating::render(&self.html_content, context),
            text_content: crate::templating::render(&self.text_content, context),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailTemplateInput {
    pub name: Option<String>,
    pub template_type: Option<TemplateType>,
    pub subject: Option<String>,
    pub html_content: Option<String>,
    pub text_content: Option<String>,
    pub variables: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateFilter {
    pub template_type: Option<TemplateType>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserEmailConfig {
    pub id: i64,
    pub user_id: i64,
    pub email_address: String,
    pub display_name: String,
    #[sqlx(try_from = "String")]
    pub provider: EmailProvider,
    pub smtp_host: String,
    pub smtp_port: i32,
    pub smtp_username: String,
    #[serde(skip_serializing)]
    pub smtp_password: String,
    pub smtp_use_tls: bool,
    pub smtp_use_ssl: bool,
    pub imap_host: String,
    pub imap_port: i32,
    pub imap_username: String,
    #[serde(skip_serializing)]
    pub imap_password: String,
    pub imap_use_ssl: bool,
    pub is_active: bool,
    pub is_verified: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserEmailConfigInput {
    pub email_address: Option<String>,
    pub display_name: Option<String>,
    pub provider: Option<EmailProvider>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i32>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_use_tls: Option<bool>,
    pub smtp_use_ssl: Option<bool>,
    pub imap_host: Option<String>,
    pub imap_port: Option<i32>,
    pub imap_username: Option<String>,
    pub imap_password: Option<String>,
    pub imap_use_ssl: Option<bool>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(status: EmailStatus, retry_count: i32) -> Email {
        Email {
            id: 1,
            email_type: EmailType::Outbound,
            status,
            subject: "Hello".into(),
            from_email: "noreply@example.com".into(),
            to_emails: "a@example.com, b@example.com,".into(),
            cc_emails: String::new(),
            bcc_emails: String::new(),
            html_content: String::new(),
            text_content: String::new(),
            template_id: None,
            case_id: None,
            user_id: None,
            message_id: None,
            thread_id: None,
            reply_to: None,
            created_at: Utc::now(),
            sent_at: None,
            delivered_at: None,
            opened_at: None,
            clicked_at: None,
            error_message: String::new(),
            retry_count,
            max_retries: 3,
            is_starred: false,
            is_archived: false,
            is_read: false,
        }
    }

    #[test]
    fn test_can_retry_only_failed_under_budget() {
        assert!(email(EmailStatus::Failed, 0).can_retry());
        assert!(email(EmailStatus::Failed, 2).can_retry());
        assert!(!email(EmailStatus::Failed, 3).can_retry());
        assert!(!email(EmailStatus::Sent, 0).can_retry());
    }

    #[test]
    fn test_is_sent() {
        assert!(email(EmailStatus::Sent, 0).is_sent());
        assert!(email(EmailStatus::Delivered, 0).is_sent());
        assert!(!email(EmailStatus::Queued, 0).is_sent());
    }

    #[test]
    fn test_recipients_split() {
        assert_eq!(
            email(EmailStatus::Draft, 0).recipients(),
            vec!["a@example.com", "b@example.com"]
        );
    }

    #[test]
    fn test_provider_defaults() {
        let gmail = EmailProvider::Gmail.defaults();
        assert_eq!(gmail.smtp_host, "smtp.gmail.com");
        assert_eq!(gmail.imap_host, "imap.gmail.com");
        assert_eq!(gmail.smtp_port, 587);
        assert_eq!(gmail.imap_port, 993);

        let outlook = EmailProvider::Outlook.defaults();
        assert_eq!(outlook.imap_host, "outlook.office365.com");

        assert_eq!(EmailProvider::Custom.defaults().smtp_host, "");
    }

    #[test]
    fn test_config_secrets_not_serialized() {
        let config = UserEmailConfig {
            id: 1,
            user_id: 1,
            email_address: "me@example.com".into(),
            display_name: String::new(),
            provider: EmailProvider::Gmail,
            smtp_host: "smtp.gmail.com".into(),
            smtp_port: 587,
            smtp_username: "me".into(),
            smtp_password: "hunter2".into(),
            smtp_use_tls: true,
            smtp_use_ssl: false,
            imap_host: String::new(),
            imap_port: 993,
            imap_username: String::new(),
            imap_password: "hunter3".into(),
            imap_use_ssl: true,
            is_active: true,
            is_verified: false,
            last_sync: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("hunter3"));
    }
}
