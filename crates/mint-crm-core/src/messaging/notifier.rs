// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fan-out of case events to email, SMS and in-app notifications.
//!
//! Channels are independent: a failure on one is logged and the others still
//! run. Callers only learn which channels went through.

use serde::Serialize;
use serde_json::{Value, json};
use sqlx::PgPool;

use super::email_service::EmailService;
use super::sms_service::{
    SmsService, assignment_message, escalation_message, resolution_message, response_message,
};
use crate::db;
use crate::models::{
    Case, CaseResponse, Contact, NewNotification, NotificationType, RenderedEmail, TemplateType,
    User,
};

/// Which channels delivered a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationOutcome {
    pub email_sent: bool,
    pub sms_sent: bool,
}

/// A case event worth telling someone about.
#[derive(Debug, Clone, Copy)]
pub enum CaseEvent<'a> {
    Assigned { assignee: &'a User },
    Response { response: &'a CaseResponse, author: Option<&'a User> },
    Escalated { manager: &'a User },
    Resolved,
}

impl CaseEvent<'_> {
    fn template_type(&self) -> TemplateType {
        match self {
            CaseEvent::Assigned { .. } => TemplateType::CaseAssignment,
            CaseEvent::Response { .. } => TemplateType::CaseResponse,
            CaseEvent::Escalated { .. } => TemplateType::CaseEscalation,
            CaseEvent::Resolved => TemplateType::CaseResolution,
        }
    }
}

fn user_json(user: &User) -> Value {
    json!({
        "id": user.id,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "full_name": user.full_name(),
        "email": user.email,
    })
}

fn contact_json(contact: &Contact) -> Value {
    json!({
        "id": contact.id,
        "first_name": contact.first_name,
        "last_name": contact.last_name,
        "full_name": contact.full_name(),
        "email": contact.email,
    })
}

/// Template context for a case event.
pub fn event_context(case: &Case, customer: Option<&Contact>, event: &CaseEvent<'_>) -> Value {
    let mut context = json!({
        "case": {
            "id": case.id,
            "case_number": case.case_number,
            "title": case.title,
            "description": case.description,
            "priority": case.priority.as_str(),
            "priority_display": case.priority.label(),
            "status": case.status.as_str(),
            "status_display": case.status.label(),
            "category": case.category.as_str(),
        },
        "customer": customer.map(contact_json).unwrap_or(Value::Null),
    });

    if let Value::Object(map) = &mut context {
        match event {
            CaseEvent::Assigned { assignee } => {
                map.insert("assigned_user".into(), user_json(assignee));
            }
            CaseEvent::Response { response, author } => {
                map.insert("response".into(), json!({ "content": response.content }));
                map.insert("agent".into(), author.map(user_json).unwrap_or(Value::Null));
            }
            CaseEvent::Escalated { manager } => {
                map.insert("manager".into(), user_json(manager));
            }
            CaseEvent::Resolved => {}
        }
    }
    context
}

/// Subject and bodies used when no active template exists for the event.
pub fn builtin_email(
    case: &Case,
    customer: Option<&Contact>,
    event: &CaseEvent<'_>,
) -> RenderedEmail {
    let customer_name = customer.map(Contact::full_name).unwrap_or_default();
    let (subject, text) = match event {
        CaseEvent::Assigned { assignee } => (
            format!("Case {} assigned to you", case.case_number),
            format!(
                "Hello {},\n\nA case has been assigned to you.\n\nCase Number: {}\nTitle: {}\nPriority: {}\nCustomer: {}\n\n{}\n\nPlease review and take appropriate action.",
                assignee.first_name,
                case.case_number,
                case.title,
                case.priority.label(),
                customer_name,
                case.description
            ),
        ),
        CaseEvent::Response { response, author } => (
            format!("Re: {} - {}", case.title, case.case_number),
            format!(
                "Hello {},\n\nThere is a new response on your case {}.\n\n{}\n\nBest regards,\n{}",
                customer_name,
                case.case_number,
                response.content,
                author.map(User::full_name).unwrap_or_else(|| "Support Team".into())
            ),
        ),
        CaseEvent::Escalated { manager } => (
            format!("Case {} escalated - {}", case.case_number, case.title),
            format!(
                "Hello {},\n\nCase {} has been escalated and requires your attention.\n\nTitle: {}\nPriority: {}\nStatus: {}\nCustomer: {}",
                manager.first_name,
                case.case_number,
                case.title,
                case.priority.label(),
                case.status.label(),
                customer_name
            ),
        ),
        CaseEvent::Resolved => (
            format!("Case {} resolved - {}", case.case_number, case.title),
            format!(
                "Hello {},\n\nYour case {} ({}) has been resolved.\n\nIf you have further questions, reply to this email.\n\nThank you for using MINTT CRM.",
                customer_name, case.case_number, case.title
            ),
        ),
    };
    RenderedEmail {
        subject,
        html_content: String::new(),
        text_content: text,
    }
}

#[derive(Clone)]
pub struct CaseNotifier {
    pool: PgPool,
    emails: EmailService,
    sms: SmsService,
}

impl CaseNotifier {
    pub fn new(pool: PgPool, emails: EmailService, sms: SmsService) -> Self {
        Self { pool, emails, sms }
    }

    pub fn emails(&self) -> &EmailService {
        &self.emails
    }

    pub fn sms(&self) -> &SmsService {
        &self.sms
    }

    async fn customer(&self, case: &Case) -> Option<Contact> {
        match db::contacts::get_contact(&self.pool, case.customer_id).await {
            Ok(contact) => contact,
            Err(e) => {
                tracing::error!(case_id = case.id, error = %e, "Failed to load case customer");
                None
            }
        }
    }

    async fn render(
        &self,
        case: &Case,
        customer: Option<&Contact>,
        event: &CaseEvent<'_>,
    ) -> (RenderedEmail, Option<i64>) {
        match db::email_templates::active_template_for(&self.pool, event.template_type()).await {
            Ok(Some(template)) => (
                template.render(&event_context(case, customer, event)),
                Some(template.id),
            ),
            Ok(None) => (builtin_email(case, customer, event), None),
            Err(e) => {
                tracing::warn!(error = %e, "Template lookup failed, using built-in text");
                (builtin_email(case, customer, event), None)
            }
        }
    }

    async fn email(
        &self,
        to: &str,
        case: &Case,
        customer: Option<&Contact>,
        event: &CaseEvent<'_>,
        owner_id: Option<i64>,
    ) -> bool {
        if to.trim().is_empty() {
            tracing::warn!(case_id = case.id, "No recipient address, email skipped");
            return false;
        }
        let (rendered, template_id) = self.render(case, customer, event).await;
        let input = crate::models::NewEmail {
            email_type: crate::models::EmailType::System,
            subject: rendered.subject,
            from_email: self.emails.from_email().to_string(),
            to_emails: to.to_string(),
            html_content: rendered.html_content,
            text_content: rendered.text_content,
            template_id,
            case_id: Some(case.id),
            user_id: owner_id,
            thread_id: case.email_thread_id.clone(),
            ..Default::default()
        };
        match self.emails.create_and_send(input).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(case_id = case.id, error = %e, "Failed to send case email");
                false
            }
        }
    }

    async fn in_app(
        &self,
        recipient_id: i64,
        kind: NotificationType,
        title: String,
        message: String,
    ) {
        let input = NewNotification {
            notification_type: kind,
            title,
            message,
            recipient_id,
        };
        if let Err(e) = db::notifications::create_notification(&self.pool, &input).await {
            tracing::warn!(recipient_id, error = %e, "Failed to create notification");
        }
    }

    /// Tell an agent a case is now theirs.
    pub async fn case_assigned(&self, case: &Case, assignee: &User) -> NotificationOutcome {
        let event = CaseEvent::Assigned { assignee };
        let customer = self.customer(case).await;
        let email_sent = self
            .email(&assignee.email, case, customer.as_ref(), &event, Some(assignee.id))
            .await;
        let sms_sent = self
            .sms
            .send_sms_to_user(assignee, &assignment_message(case), Some(case.id))
            .await
            .is_some();
        self.in_app(
            assignee.id,
            NotificationType::CaseAssigned,
            format!("Case {} assigned to you", case.case_number),
            case.title.clone(),
        )
        .await;
        NotificationOutcome { email_sent, sms_sent }
    }

    /// Email a response to the customer. Goes to the response's `email_to`
    /// when set, otherwise the customer's address. Stamps the case's
    /// `last_email_sent` on success.
    pub async fn response_email(
        &self,
        case: &Case,
        response: &CaseResponse,
        author: Option<&User>,
    ) -> bool {
        let customer = self.customer(case).await;
        self.response_email_to(case, customer.as_ref(), response, author)
            .await
    }

    async fn response_email_to(
        &self,
        case: &Case,
        customer: Option<&Contact>,
        response: &CaseResponse,
        author: Option<&User>,
    ) -> bool {
        let event = CaseEvent::Response { response, author };
        let to = response
            .email_to
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| customer.map(|c| c.email.clone()))
            .unwrap_or_default();
        let sent = self
            .email(&to, case, customer, &event, author.map(|a| a.id))
            .await;
        if sent {
            if let Err(e) = db::cases::set_last_email_sent(&self.pool, case.id).await {
                tracing::warn!(case_id = case.id, error = %e, "Failed to stamp last_email_sent");
            }
        }
        sent
    }

    /// Tell the customer about a customer-facing response. Email goes out only
    /// when the response names a recipient; SMS when the customer has a phone.
    pub async fn case_response(
        &self,
        case: &Case,
        response: &CaseResponse,
        author: Option<&User>,
    ) -> NotificationOutcome {
        let customer = self.customer(case).await;

        let wants_email = response
            .email_to
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        let email_sent = wants_email
            && self
                .response_email_to(case, customer.as_ref(), response, author)
                .await;

        let sms_sent = match &customer {
            Some(contact) => self
                .sms
                .send_sms_to_contact(contact, &response_message(case), Some(case.id))
                .await
                .is_some(),
            None => false,
        };

        if let Some(user_id) = customer.as_ref().and_then(|c| c.user_id) {
            self.in_app(
                user_id,
                NotificationType::CaseUpdated,
                format!("New response on case {}", case.case_number),
                case.title.clone(),
            )
            .await;
        }
        tracing::info!(
            case_id = case.id,
            email_sent,
            sms_sent,
            "Case response notifications"
        );
        NotificationOutcome { email_sent, sms_sent }
    }

    pub async fn case_escalated(&self, case: &Case, manager: &User) -> NotificationOutcome {
        let event = CaseEvent::Escalated { manager };
        let customer = self.customer(case).await;
        let email_sent = self
            .email(&manager.email, case, customer.as_ref(), &event, Some(manager.id))
            .await;
        let sms_sent = self
            .sms
            .send_sms_to_user(manager, &escalation_message(case), Some(case.id))
            .await
            .is_some();
        self.in_app(
            manager.id,
            NotificationType::CaseEscalated,
            format!("Case {} escalated", case.case_number),
            case.title.clone(),
        )
        .await;
        NotificationOutcome { email_sent, sms_sent }
    }

    pub async fn case_resolved(&self, case: &Case) -> NotificationOutcome {
        let event = CaseEvent::Resolved;
        let Some(customer) = self.customer(case).await else {
            return NotificationOutcome::default();
        };
        let email_sent = self
            .email(&customer.email, case, Some(&customer), &event, None)
            .await;
        let sms_sent = self
            .sms
            .send_sms_to_contact(&customer, &resolution_message(case), Some(case.id))
            .await
            .is_some();
        if let Some(user_id) = customer.user_id {
            self.in_app(
                user_id,
                NotificationType::CaseUpdated,
                format!("Case {} resolved", case.case_number),
                case.title.clone(),
            )
            .await;
        }
        NotificationOutcome { email_sent, sms_sent }
    }
}
