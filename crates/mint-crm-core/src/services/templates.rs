// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Default email and SMS templates for case events.

use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;

use crate::db;
use crate::models::{EmailTemplateInput, SmsTemplateInput, TemplateType};

struct DefaultEmailTemplate {
    name: &'static str,
    template_type: TemplateType,
    subject: &'static str,
    text: &'static str,
    html: &'static str,
}

const DEFAULT_EMAIL_TEMPLATES: &[DefaultEmailTemplate] = &[
    DefaultEmailTemplate {
        name: "Case Assignment",
        template_type: TemplateType::CaseAssignment,
        subject: "Case {{ case.case_number }} assigned to you",
        text: "Hello {{ assigned_user.first_name }},\n\n\
               Case {{ case.case_number }} has been assigned to you.\n\n\
               Title: {{ case.title }}\n\
               Priority: {{ case.priority }}\n\
               Customer: {{ customer.full_name }}\n\n\
               Description:\n{{ case.description }}\n",
        html: "<p>Hello {{ assigned_user.first_name }},</p>\
               <p>Case <strong>{{ case.case_number }}</strong> has been assigned to you.</p>\
               <ul><li>Title: {{ case.title }}</li><li>Priority: {{ case.priority }}</li>\
               <li>Customer: {{ customer.full_name }}</li></ul>\
               <p>{{ case.description }}</p>",
    },
    DefaultEmailTemplate {
        name: "Case Response",
        template_type: TemplateType::CaseResponse,
        subject: "Re: {{ case.title }} - {{ case.case_number }}",
        text: "Dear {{ customer.full_name }},\n\n\
               {{ response.content }}\n\n\
               Best regards,\n{{ agent.full_name }}\n",
        html: "<p>Dear {{ customer.full_name }},</p>\
               <p>{{ response.content }}</p>\
               <p>Best regards,<br>{{ agent.full_name }}</p>",
    },
    DefaultEmailTemplate {
        name: "Case Escalation",
        template_type: TemplateType::CaseEscalation,
        subject: "Case {{ case.case_number }} escalated - {{ case.title }}",
        text: "Hello {{ manager.first_name }},\n\n\
               Case {{ case.case_number }} has been escalated and requires your attention.\n\n\
               Title: {{ case.title }}\n\
               Priority: {{ case.priority }}\n\
               Customer: {{ customer.full_name }}\n",
        html: "<p>Hello {{ manager.first_name }},</p>\
               <p>Case <strong>{{ case.case_number }}</strong> has been escalated and requires your attention.</p>\
               <ul><li>Title: {{ case.title }}</li><li>Priority: {{ case.priority }}</li>\
               <li>Customer: {{ customer.full_name }}</li></ul>",
    },
    DefaultEmailTemplate {
        name: "Case Resolution",
        template_type: TemplateType::CaseResolution,
        subject: "Case {{ case.case_number }} resolved - {{ case.title }}",
        text: "Dear {{ customer.full_name }},\n\n\
               Your case {{ case.case_number }} ({{ case.title }}) has been resolved.\n\n\
               If the issue persists, simply reply to this email.\n\n\
               Thank you for using MINTT CRM.\n",
        html: "<p>Dear {{ customer.full_name }},</p>\
               <p>Your case <strong>{{ case.case_number }}</strong> ({{ case.title }}) has been resolved.</p>\
               <p>If the issue persists, simply reply to this email.</p>\
               <p>Thank you for using MINTT CRM.</p>",
    },
];

const DEFAULT_SMS_TEMPLATES: &[(&str, TemplateType, &str)] = &[
    (
        "Case Assignment SMS",
        TemplateType::CaseAssignment,
        "Case #{{ case.case_number }} has been assigned to you. Title: {{ case.title }}. Please check your MINTT CRM account. Thank you.",
    ),
    (
        "Case Response SMS",
        TemplateType::CaseResponse,
        "Your case #{{ case.case_number }} has received a response. Please check your MINTT CRM account for details. Thank you.",
    ),
    (
        "Case Escalation SMS",
        TemplateType::CaseEscalation,
        "Case #{{ case.case_number }} has been escalated and requires your attention. Please check your MINTT CRM account. Thank you.",
    ),
    (
        "Case Resolution SMS",
        TemplateType::CaseResolution,
        "Your case #{{ case.case_number }} has been resolved. Thank you for using MINTT CRM.",
    ),
];

/// What a seeding run created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub email_templates_created: usize,
    pub sms_templates_created: usize,
}

/// Create the default templates that do not exist yet. Existing templates
/// with the same name and type are left untouched.
pub async fn seed_default_templates(
    pool: &PgPool,
    created_by_id: Option<i64>,
) -> crate::Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for template in DEFAULT_EMAIL_TEMPLATES {
        if db::email_templates::template_exists(pool, template.name, template.template_type)
            .await?
        {
            continue;
        }
        let input = EmailTemplateInput {
            name: Some(template.name.to_string()),
            template_type: Some(template.template_type),
            subject: Some(template.subject.to_string()),
            html_content: Some(template.html.to_string()),
            text_content: Some(template.text.to_string()),
            variables: Some(json!(crate::templating::placeholders(template.text))),
            is_active: Some(true),
        };
        db::email_templates::create_template(pool, &input, created_by_id).await?;
        summary.email_templates_created += 1;
        tracing::info!(name = template.name, "Created default email template");
    }

    for (name, template_type, message) in DEFAULT_SMS_TEMPLATES {
        if db::sms_templates::template_exists(pool, name, *template_type).await? {
            continue;
        }
        let input = SmsTemplateInput {
            name: Some(name.to_string()),
            template_type: Some(*template_type),
            message: Some(message.to_string()),
            variables: Some(json!(crate::templating::placeholders(message))),
            is_active: Some(true),
        };
        db::sms_templates::create_template(pool, &input, created_by_id).await?;
        summary.sms_templates_created += 1;
        tracing::info!(name = *name, "Created default SMS template");
    }

    Ok(summary)
}
