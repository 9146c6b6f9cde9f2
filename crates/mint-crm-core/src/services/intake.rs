// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Turning inbound email into cases.

use sqlx::PgPool;

use crate::db;
use crate::models::{
    Case, CaseCategory, CaseSource, Email, NewCase, NewCaseResponse, Priority, ResponseType,
};

/// An inbound message as seen by the intake service.
#[derive(Debug, Clone, Default)]
pub struct InboundEmail {
    /// `addr@host` or `Display Name <addr@host>`.
    pub from: String,
    pub subject: String,
    pub body: String,
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
}

/// Split `"Jane Doe <jane@example.com>"` into its display name and address.
pub fn split_sender(from: &str) -> (Option<&str>, &str) {
    let from = from.trim();
    match (from.find('<'), from.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = from[..open].trim().trim_matches('"').trim();
            let address = from[open + 1..close].trim();
            ((!name.is_empty()).then_some(name), address)
        }
        _ => (None, from),
    }
}

/// First and last name from a display name. A missing display name yields
/// "Unknown" and an empty last name.
pub fn split_name(display_name: Option<&str>) -> (String, String) {
    let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return ("Unknown".to_string(), String::new());
    };
    match name.split_once(char::is_whitespace) {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

/// Create a case from an inbound email.
///
/// The sender becomes the customer (created when unknown), the subject the
/// title and the body the first customer response. `created_by_id` is
/// recorded as creator; it also authors the response when the contact has
/// no portal login.
pub async fn create_case_from_email(
    pool: &PgPool,
    email: &InboundEmail,
    created_by_id: i64,
) -> crate::Result<Case> {
    let (display_name, address) = split_sender(&email.from);
    if address.is_empty() {
        return Err(crate::Error::validation("Sender address is required"));
    }
    let (first_name, last_name) = split_name(display_name);

    let (contact, created) =
        db::contacts::get_or_create_by_email(pool, address, &first_name, &last_name).await?;
    if created {
        tracing::info!(
            contact_id = contact.id,
            email = %contact.email,
            "Created contact from inbound email"
        );
    }

    let title = if email.subject.trim().is_empty() {
        "Email Support Request".to_string()
    } else {
        email.subject.trim().to_string()
    };

    let case = db::cases::create_case(
        pool,
        &NewCase {
            title,
            description: email.body.clone(),
            category: CaseCategory::General,
            priority: Priority::Medium,
            source: CaseSource::Email,
            customer_id: contact.id,
            email_thread_id: email.thread_id.clone().or_else(|| email.message_id.clone()),
            ..Default::default()
        },
        created_by_id,
    )
    .await?;

    db::case_responses::create_response(
        pool,
        &NewCaseResponse {
            case_id: case.id,
            response_type: ResponseType::Customer,
            content: email.body.clone(),
            is_internal: Some(false),
            email_subject: Some(email.subject.clone()),
            email_from: Some(address.to_string()),
            ..Default::default()
        },
        contact.user_id.unwrap_or(created_by_id),
    )
    .await?;

    tracing::info!(case_id = case.id, case_number = %case.case_number, "Case created from email");
    Ok(case)
}

/// Overrides for [`create_case_from_stored_email`].
#[derive(Debug, Clone, Default)]
pub struct EmailCaseOptions {
    pub customer_id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<CaseCategory>,
    pub company_id: Option<i64>,
    pub assigned_to_id: Option<i64>,
}

/// Create a case from a stored email for an explicitly chosen customer and
/// link the email to it.
pub async fn create_case_from_stored_email(
    pool: &PgPool,
    email: &Email,
    options: EmailCaseOptions,
    created_by_id: i64,
) -> crate::Result<(Case, Email)> {
    db::contacts::get_contact(pool, options.customer_id)
        .await?
        .ok_or_else(|| crate::Error::validation("Customer does not exist"))?;

    let case = db::cases::create_case(
        pool,
        &NewCase {
            title: options
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| email.subject.clone()),
            description: options
                .description
                .unwrap_or_else(|| email.text_content.clone()),
            category: options.category.unwrap_or(CaseCategory::General),
            priority: options.priority.unwrap_or(Priority::Medium),
            source: CaseSource::Email,
            customer_id: options.customer_id,
            company_id: options.company_id,
            assigned_to_id: options.assigned_to_id,
            email_thread_id: email.thread_id.clone().or_else(|| email.message_id.clone()),
            ..Default::default()
        },
        created_by_id,
    )
    .await?;

    let email = db::emails::link_case(pool, email.id, case.id)
        .await?
        .ok_or(crate::Error::NotFound("Email"))?;
    Ok((case, email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sender() {
        assert_eq!(
            split_sender("Jane Doe <jane@example.com>"),
            (Some("Jane Doe"), "jane@example.com")
        );
        assert_eq!(
            split_sender("\"Doe, Jane\" <jane@example.com>"),
            (Some("Doe, Jane"), "jane@example.com")
        );
        assert_eq!(split_sender("<jane@example.com>"), (None, "jane@example.com"));
        assert_eq!(split_sender(" jane@example.com "), (None, "jane@example.com"));
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name(Some("Jane Doe")), ("Jane".into(), "Doe".into()));
        assert_eq!(
            split_name(Some("Ana Maria Lopez")),
            ("Ana".into(), "Maria Lopez".into())
        );
        assert_eq!(split_name(Some("Cher")), ("Cher".into(), String::new()));
        assert_eq!(split_name(None), ("Unknown".into(), String::new()));
    }
}
