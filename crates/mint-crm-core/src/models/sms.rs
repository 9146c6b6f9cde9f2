// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SMS records, delivery log, templates and per-user provider settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TemplateType;

/// Longest message the gateway accepts (ten concatenated segments).
pub const MAX_SMS_LENGTH: usize = 1600;

crm_enum! {
    pub enum SmsType {
        #[default]
        Outbound => ("outbound", "Outbound"),
        Inbound => ("inbound", "Inbound"),
        System => ("system", "System"),
    }
}

crm_enum! {
    pub enum SmsStatus {
        #[default]
        Draft => ("draft", "Draft"),
        Queued => ("queued", "Queued"),
        Sent => ("sent", "Sent"),
        Delivered => ("delivered", "Delivered"),
        Failed => ("failed", "Failed"),
        Undelivered => ("undelivered", "Undelivered"),
    }
}

crm_enum! {
    pub enum SmsEvent {
        #[default]
        Sent => ("sent", "Sent"),
        Delivered => ("delivered", "Delivered"),
        Read => ("read", "Read"),
        Failed => ("failed", "Failed"),
        Undelivered => ("undelivered", "Undelivered"),
    }
}

crm_enum! {
    pub enum SmsProvider {
        Twilio => ("twilio", "Twilio"),
        AwsSns => ("aws_sns", "AWS SNS"),
        Nexmo => ("nexmo", "Nexmo/Vonage"),
        #[default]
        Custom => ("custom", "Custom SMS API"),
    }
}

impl SmsProvider {
    /// Credential fields the provider needs before it can be verified.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            SmsProvider::Twilio => &["account_sid", "auth_token"],
            SmsProvider::AwsSns | SmsProvider::Nexmo => &["api_key", "api_secret"],
            SmsProvider::Custom => &["from_number"],
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Sms {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub sms_type: SmsType,
    #[sqlx(try_from = "String")]
    pub status: SmsStatus,
    pub message: String,
    pub from_number: String,
    pub to_number: String,
    pub template_id: Option<i64>,
    pub case_id: Option<i64>,
    pub user_id: Option<i64>,
    pub contact_id: Option<i64>,
    pub message_id: Option<String>,
    pub conversation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub error_message: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub is_starred: bool,
    pub is_archived: bool,
    pub is_read: bool,
}

impl Sms {
    pub fn can_retry(&self) -> bool {
        self.status == SmsStatus::Failed && self.retry_count < self.max_retries
    }
}

/// Fields for recording an SMS.
#[derive(Debug, Clone, Default)]
pub struct NewSms {
    pub sms_type: SmsType,
    pub status: SmsStatus,
    pub message: String,
    pub from_number: String,
    pub to_number: String,
    pub template_id: Option<i64>,
    pub case_id: Option<i64>,
    pub user_id: Option<i64>,
    pub contact_id: Option<i64>,
    pub message_id: Option<String>,
    pub error_message: String,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmsFilter {
    pub sms_type: Option<SmsType>,
    pub status: Option<SmsStatus>,
    pub case: Option<i64>,
    pub contact: Option<i64>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SmsLog {
    pub id: i64,
    pub sms_id: i64,
    #[sqlx(try_from = "String")]
    pub event: SmsEvent,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SmsTemplate {
    pub id: i64,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub template_type: TemplateType,
    pub message: String,
    pub variables: serde_json::Value,
    pub is_active: bool,
    pub created_by_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SmsTemplate {
    pub fn render(&self, context: &serde_json::Value) -> String {
        crate::templating::render(&self.message, context)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmsTemplateInput {
    pub name: Option<String>,
    pub template_type: Option<TemplateType>,
    pub message: Option<String>,
    pub variables: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

impl SmsTemplateInput {
    pub fn validate(&self) -> crate::Result<()> {
        if self.template_type == Some(TemplateType::PasswordReset) {
            return Err(crate::Error::validation(
                "password_reset is not a valid SMS template type",
            ));
        }
        if let Some(message) = &self.message {
            validate_message(message)?;
        }
        Ok(())
    }
}

/// Non-empty and within [`MAX_SMS_LENGTH`] characters.
pub fn validate_message(message: &str) -> crate::Result<()> {
    if message.trim().is_empty() {
        return Err(crate::Error::validation("Message is required"));
    }
    if message.chars().count() > MAX_SMS_LENGTH {
        return Err(crate::Error::validation(format!(
            "Message exceeds {MAX_SMS_LENGTH} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserSmsConfig {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "String")]
    pub provider: SmsProvider,
    pub account_sid: String,
    #[serde(skip_serializing)]
    pub auth_token: String,
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
    pub from_number: String,
    pub webhook_url: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserSmsConfig {
    /// Names of required credentials that are still blank.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        self.provider
            .required_fields()
            .iter()
            .copied()
            .filter(|field| {
                let value = match *field {
                    "account_sid" => &self.account_sid,
                    "auth_token" => &self.auth_token,
                    "api_key" => &self.api_key,
                    "api_secret" => &self.api_secret,
                    _ => &self.from_number,
                };
                value.trim().is_empty()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSmsConfigInput {
    pub provider: Option<SmsProvider>,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub from_number: Option<String>,
    pub webhook_url: Option<String>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: SmsProvider) -> UserSmsConfig {
        UserSmsConfig {
            id: 1,
            user_id: 1,
            provider,
            account_sid: String::new(),
            auth_token: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            from_number: String::new(),
            webhook_url: String::new(),
            is_active: true,
            is_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_twilio_needs_sid_and_token() {
        let mut c = config(SmsProvider::Twilio);
        assert_eq!(c.missing_credentials(), vec!["account_sid", "auth_token"]);
        c.account_sid = "AC123".into();
        c.auth_token = "tok".into();
        assert!(c.missing_credentials().is_empty());
    }

    #[test]
    fn test_sns_and_nexmo_need_key_and_secret() {
        for provider in [SmsProvider::AwsSns, SmsProvider::Nexmo] {
            let mut c = config(provider);
            c.api_key = "key".into();
            assert_eq!(c.missing_credentials(), vec!["api_secret"]);
        }
    }

    #[test]
    fn test_message_length_limit() {
        assert!(validate_message("hello").is_ok());
        assert!(validate_message("   ").is_err());
        assert!(validate_message(&"x".repeat(MAX_SMS_LENGTH)).is_ok());
        assert!(validate_message(&"x".repeat(MAX_SMS_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_sms_template_rejects_password_reset() {
        let input = SmsTemplateInput {
            template_type: Some(TemplateType::PasswordReset),
            ..Default::default()
        };
        assert!(input.validate().is_err());
    }
}
