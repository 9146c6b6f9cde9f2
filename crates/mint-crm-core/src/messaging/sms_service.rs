// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sending SMS and recording the outcome.
//!
//! Every send writes an [`Sms`] row and an [`SmsLog`](crate::models::SmsLog)
//! entry. Gateway failures are logged and recorded, never propagated to the
//! caller of the user-facing helpers.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;

use super::sms_gateway::{SmsError, SmsGateway};
use crate::db;
use crate::models::{Case, Contact, NewSms, Sms, SmsEvent, SmsStatus, SmsType, User};

/// Sender recorded on outbound messages when none is configured.
pub const DEFAULT_FROM_NUMBER: &str = "SYSTEM";

/// Rewrite a leading `251` country code to the local `0` prefix.
pub fn normalize_phone(phone: &str) -> String {
    let phone = phone.trim();
    match phone.strip_prefix("251") {
        Some(rest) => format!("0{rest}"),
        None => phone.to_string(),
    }
}

pub fn assignment_message(case: &Case) -> String {
    format!(
        "Case #{} has been assigned to you. Title: {}. Please check your MINTT CRM account. Thank you.",
        case.case_number, case.title
    )
}

pub fn response_message(case: &Case) -> String {
    format!(
        "Your case #{} has received a response. Please check your MINTT CRM account for details. Thank you.",
        case.case_number
    )
}

pub fn escalation_message(case: &Case) -> String {
    format!(
        "Case #{} has been escalated and requires your attention. Please check your MINTT CRM account. Thank you.",
        case.case_number
    )
}

pub fn resolution_message(case: &Case) -> String {
    format!(
        "Your case #{} has been resolved. Thank you for using MINTT CRM.",
        case.case_number
    )
}

/// Outcome for one recipient of a bulk send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkStatus {
    Sent,
    Failed,
    NoPhone,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSmsResult {
    pub user_id: i64,
    pub phone: Option<String>,
    pub status: BulkStatus,
    pub sms_id: Option<i64>,
}

#[derive(Clone)]
pub struct SmsService {
    pool: PgPool,
    gateway: Arc<dyn SmsGateway>,
    from_number: String,
}

impl SmsService {
    pub fn new(pool: PgPool, gateway: Arc<dyn SmsGateway>, from_number: impl Into<String>) -> Self {
        Self {
            pool,
            gateway,
            from_number: from_number.into(),
        }
    }

    /// Send to a user's phone number. Returns the recorded SMS id on success.
    ///
    /// Users without a phone are skipped. On failure a `failed` record is
    /// written only when the message concerns a case.
    pub async fn send_sms_to_user(
        &self,
        user: &User,
        message: &str,
        case_id: Option<i64>,
    ) -> Option<i64> {
        let Some(phone) = user.phone_number() else {
            tracing::warn!(user_id = user.id, "User has no phone number, SMS skipped");
            return None;
        };
        self.send_and_record(phone, message, case_id, Some(user.id), None)
            .await
    }

    /// Same as [`send_sms_to_user`](Self::send_sms_to_user) for a contact's
    /// mobile or phone.
    pub async fn send_sms_to_contact(
        &self,
        contact: &Contact,
        message: &str,
        case_id: Option<i64>,
    ) -> Option<i64> {
        let Some(phone) = contact.primary_phone() else {
            tracing::warn!(contact_id = contact.id, "Contact has no phone number, SMS skipped");
            return None;
        };
        self.send_and_record(phone, message, case_id, contact.user_id, Some(contact.id))
            .await
    }

    async fn send_and_record(
        &self,
        phone: &str,
        message: &str,
        case_id: Option<i64>,
        user_id: Option<i64>,
        contact_id: Option<i64>,
    ) -> Option<i64> {
        let phone = normalize_phone(phone);
        let mut record = NewSms {
            sms_type: SmsType::Outbound,
            message: message.to_string(),
            from_number: self.from_number.clone(),
            to_number: phone.clone(),
            case_id,
            user_id,
            contact_id,
            ..Default::default()
        };

        match self.gateway.send(&phone, message).await {
            Ok(result) => {
                record.status = SmsStatus::Sent;
                record.sent_at = Some(Utc::now());
                record.message_id = gateway_message_id(&result);
                let data = json!({ "result": result, "phone_number": phone });
                match self.record(&record, SmsEvent::Sent, data).await {
                    Ok(sms) => {
                        tracing::info!(sms_id = sms.id, phone = %phone, "SMS sent");
                        Some(sms.id)
                    }
                    Err(e) => {
                        tracing::error!(phone = %phone, error = %e, "SMS sent but not recorded");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::error!(phone = %phone, error = %e, "Failed to send SMS");
                if case_id.is_some() {
                    record.status = SmsStatus::Failed;
                    record.error_message = e.to_string();
                    let data = json!({ "error": e.to_string(), "phone_number": phone });
                    if let Err(db_err) = self.record(&record, SmsEvent::Failed, data).await {
                        tracing::error!(error = %db_err, "Failed to record SMS failure");
                    }
                }
                None
            }
        }
    }

    async fn record(
        &self,
        record: &NewSms,
        event: SmsEvent,
        data: serde_json::Value,
    ) -> Result<Sms, sqlx::Error> {
        let sms = db::sms::create_sms(&self.pool, record).await?;
        db::sms::add_log(&self.pool, sms.id, event, &data).await?;
        Ok(sms)
    }

    /// Send an ad-hoc message on behalf of `sender_id`. The record is written
    /// first and then marked sent or failed, so it exists either way.
    pub async fn send_to_number(
        &self,
        sender_id: i64,
        to_number: &str,
        message: &str,
        case_id: Option<i64>,
        contact_id: Option<i64>,
    ) -> crate::Result<Sms> {
        let sms = db::sms::create_sms(
            &self.pool,
            &NewSms {
                sms_type: SmsType::Outbound,
                status: SmsStatus::Queued,
                message: message.to_string(),
                from_number: self.from_number.clone(),
                to_number: normalize_phone(to_number),
                case_id,
                user_id: Some(sender_id),
                contact_id,
                ..Default::default()
            },
        )
        .await?;
        self.deliver(sms).await
    }

    /// Retry a failed message in place.
    pub async fn resend(&self, sms: Sms) -> crate::Result<Sms> {
        if sms.status != SmsStatus::Failed {
            return Err(crate::Error::validation("Only failed SMS can be resent"));
        }
        self.deliver(sms).await
    }

    async fn deliver(&self, sms: Sms) -> crate::Result<Sms> {
        let outcome = self.gateway.send(&sms.to_number, &sms.message).await;
        let updated = match outcome {
            Ok(result) => {
                let message_id = gateway_message_id(&result);
                let updated = db::sms::mark_sent(&self.pool, sms.id, message_id.as_deref()).await?;
                db::sms::add_log(
                    &self.pool,
                    sms.id,
                    SmsEvent::Sent,
                    &json!({ "result": result, "phone_number": sms.to_number }),
                )
                .await?;
                updated
            }
            Err(e) => {
                tracing::warn!(sms_id = sms.id, error = %e, "SMS delivery failed");
                let updated = db::sms::mark_failed(&self.pool, sms.id, &e.to_string()).await?;
                db::sms::add_log(
                    &self.pool,
                    sms.id,
                    SmsEvent::Failed,
                    &json!({ "error": e.to_string(), "phone_number": sms.to_number }),
                )
                .await?;
                updated
            }
        };
        updated.ok_or(crate::Error::NotFound("SMS"))
    }

    /// Send one message to several users. Unknown ids are ignored.
    pub async fn send_bulk(
        &self,
        user_ids: &[i64],
        message: &str,
        case_id: Option<i64>,
    ) -> crate::Result<Vec<BulkSmsResult>> {
        let mut results = Vec::with_capacity(user_ids.len());
        for &user_id in user_ids {
            let Some(user) = db::users::get_user(&self.pool, user_id).await? else {
                continue;
            };
            let phone = user.phone_number().map(normalize_phone);
            let (status, sms_id) = if phone.is_none() {
                (BulkStatus::NoPhone, None)
            } else {
                match self.send_sms_to_user(&user, message, case_id).await {
                    Some(id) => (BulkStatus::Sent, Some(id)),
                    None => (BulkStatus::Failed, None),
                }
            };
            results.push(BulkSmsResult {
                user_id,
                phone,
                status,
                sms_id,
            });
        }
        Ok(results)
    }

    /// Send directly through the gateway without recording anything.
    pub async fn send_raw(
        &self,
        phone: &str,
        message: &str,
    ) -> Result<serde_json::Value, SmsError> {
        self.gateway.send(&normalize_phone(phone), message).await
    }
}

/// Message id from a gateway reply, when it carries one.
fn gateway_message_id(result: &serde_json::Value) -> Option<String> {
    ["message_id", "messageId", "id"]
        .iter()
        .find_map(|key| match result.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseCategory, CaseSource, CaseStatus, Priority};
    use sqlx::types::Json;

    fn case() -> Case {
        Case {
            id: 7,
            case_number: "CASE-000042".into(),
            title: "Printer on fire".into(),
            description: String::new(),
            category: CaseCategory::Technical,
            priority: Priority::High,
            status: CaseStatus::Assigned,
            source: CaseSource::Phone,
            customer_id: 1,
            company_id: None,
            assigned_to_id: Some(2),
            created_by_id: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            resolved_at: None,
            due_date: None,
            sla_hours: 24,
            first_response_secs: None,
            resolution_secs: None,
            tags: Json(vec![]),
            email_thread_id: None,
            last_email_sent: None,
        }
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("251911223344"), "0911223344");
        assert_eq!(normalize_phone(" 0911223344 "), "0911223344");
        assert_eq!(normalize_phone("+251911223344"), "+251911223344");
        assert_eq!(normalize_phone("14155550100"), "14155550100");
    }

    #[test]
    fn test_message_texts() {
        let case = case();
        assert_eq!(
            assignment_message(&case),
            "Case #CASE-000042 has been assigned to you. Title: Printer on fire. Please check your MINTT CRM account. Thank you."
        );
        assert!(
            response_message(&case).starts_with("Your case #CASE-000042 has received a response.")
        );
        assert!(
            escalation_message(&case).contains("has been escalated and requires your attention")
        );
        assert_eq!(
            resolution_message(&case),
            "Your case #CASE-000042 has been resolved. Thank you for using MINTT CRM."
        );
    }

    #[test]
    fn test_gateway_message_id() {
        assert_eq!(
            gateway_message_id(&json!({"message_id": "abc"})).as_deref(),
            Some("abc")
        );
        assert_eq!(gateway_message_id(&json!({"id": 12})).as_deref(), Some("12"));
        assert_eq!(gateway_message_id(&json!({"status": "ok"})), None);
    }

    #[test]
    fn test_bulk_status_serializes_snake_case() {
        assert_eq!(serde_json::to_value(BulkStatus::NoPhone).unwrap(), json!("no_phone"));
    }
}
