// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Emails, email templates and per-user email settings.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use mint_crm_core::db::{self, LabelCount, emails::EmailStats};
use mint_crm_core::messaging::email_service::{forward_body, reply_subject};
use mint_crm_core::messaging::{Mailer, SmtpMailer, SmtpSettings};
use mint_crm_core::models::{
    Case, CaseCategory, Email, EmailFilter, EmailProvider, EmailTemplate, EmailTemplateInput,
    EmailType, NewEmail, Priority, ProviderDefaults, RenderedEmail, TemplateFilter, User,
    UserEmailConfig, UserEmailConfigInput,
};
use mint_crm_core::permissions::CaseScope;
use mint_crm_core::services::intake::{EmailCaseOptions, create_case_from_stored_email};
use mint_crm_core::templating;

use super::{DaysParam, PageParams, Paginated, message, no_content, optional_json};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

async fn own_email(state: &AppState, user: &User, id: i64) -> ApiResult<Email> {
    db::emails::get_user_email(&state.pool, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email"))
}

pub async fn list_emails(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<EmailFilter>,
) -> ApiResult<Json<Paginated<Email>>> {
    let page = page.request();
    let owner = Some(user.id);
    let count = db::emails::count_emails(&state.pool, owner, &filter).await?;
    let emails = db::emails::list_emails(&state.pool, owner, &filter, page).await?;
    Ok(Json(Paginated::new(count, page, emails)))
}

pub async fn get_email(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Email>> {
    Ok(Json(own_email(&state, &user, id).await?))
}

pub async fn delete_email(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    own_email(&state, &user, id).await?;
    db::emails::delete_email(&state.pool, id).await?;
    Ok(no_content())
}

/// `POST /api/emails/{id}/retry/`
pub async fn retry_email(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Email>> {
    let email = own_email(&state, &user, id).await?;
    if !email.can_retry() {
        return Err(ApiError::bad_request("Email cannot be retried"));
    }
    Ok(Json(state.emails().deliver(&email).await?))
}

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    #[serde(default)]
    pub to_emails: String,
    #[serde(default)]
    pub cc_emails: String,
    #[serde(default)]
    pub bcc_emails: String,
    pub subject: Option<String>,
    pub html_content: Option<String>,
    pub text_content: Option<String>,
    pub case_id: Option<i64>,
    pub template_id: Option<i64>,
    pub context: Option<Value>,
}

/// Fill blank subject and bodies from a rendered template.
fn apply_template(req: &mut SendEmailRequest, rendered: RenderedEmail) {
    let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
    if blank(&req.subject) {
        req.subject = Some(rendered.subject);
    }
    if blank(&req.html_content) {
        req.html_content = Some(rendered.html_content);
    }
    if blank(&req.text_content) {
        req.text_content = Some(rendered.text_content);
    }
}

/// `POST /api/emails/send_email/`
///
/// Sends through the caller's verified SMTP settings when present, otherwise
/// through the server mailer.
pub async fn send_email(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(mut req): AppJson<SendEmailRequest>,
) -> ApiResult<(StatusCode, Json<Email>)> {
    if req.to_emails.trim().is_empty() {
        return Err(ApiError::bad_request("to_emails is required"));
    }
    if let Some(case_id) = req.case_id {
        db::cases::get_visible_case(&state.pool, case_id, CaseScope::for_user(&user))
            .await?
            .ok_or_else(|| ApiError::not_found("Case"))?;
    }
    if let Some(template_id) = req.template_id {
        let template = db::email_templates::get_template(&state.pool, template_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Email template"))?;
        let context = req.context.take().unwrap_or_else(|| json!({}));
        apply_template(&mut req, template.render(&context));
    }
    let subject = req
        .subject
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Subject is required"))?;

    let email = state
        .emails()
        .create_and_send(NewEmail {
            email_type: EmailType::Outbound,
            subject,
            to_emails: req.to_emails,
            cc_emails: req.cc_emails,
            bcc_emails: req.bcc_emails,
            html_content: req.html_content.unwrap_or_default(),
            text_content: req.text_content.unwrap_or_default(),
            template_id: req.template_id,
            case_id: req.case_id,
            user_id: Some(user.id),
            ..Default::default()
        })
        .await?;
    Ok((StatusCode::CREATED, Json(email)))
}

/// `GET /api/emails/stats/?days=30`
pub async fn email_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(days): AppQuery<DaysParam>,
) -> ApiResult<Json<EmailStats>> {
    let stats =
        db::emails::email_stats(&state.pool, Some(user.id), days.since(Utc::now())).await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub content: String,
    pub html_content: Option<String>,
}

/// `POST /api/emails/{id}/reply/`
pub async fn reply(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    AppJson(req): AppJson<ReplyRequest>,
) -> ApiResult<(StatusCode, Json<Email>)> {
    let original = own_email(&state, &user, id).await?;
    if req.content.trim().is_empty() {
        return Err(ApiError::bad_request("Reply content is required"));
    }

    let email = state
        .emails()
        .create_and_send(NewEmail {
            email_type: EmailType::Outbound,
            subject: reply_subject(&original.subject),
            to_emails: original.from_email.clone(),
            text_content: req.content,
            html_content: req.html_content.unwrap_or_default(),
            case_id: original.case_id,
            user_id: Some(user.id),
            thread_id: original
                .thread_id
                .clone()
                .or_else(|| original.message_id.clone()),
            reply_to: original.message_id.clone(),
            ..Default::default()
        })
        .await?;
    Ok((StatusCode::CREATED, Json(email)))
}

#[derive(Debug, Deserialize)]
pub struct ForwardRequest {
    pub to_email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// `POST /api/emails/{id}/forward/`
pub async fn forward(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    AppJson(req): AppJson<ForwardRequest>,
) -> ApiResult<(StatusCode, Json<Email>)> {
    let original = own_email(&state, &user, id).await?;
    let to = req
        .to_email
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("to_email is required"))?;

    let email = state
        .emails()
        .create_and_send(NewEmail {
            email_type: EmailType::Outbound,
            subject: req
                .subject
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| format!("Fwd: {}", original.subject)),
            to_emails: to,
            text_content: forward_body(&original, req.message.as_deref()),
            case_id: original.case_id,
            user_id: Some(user.id),
            ..Default::default()
        })
        .await?;
    Ok((StatusCode::CREATED, Json(email)))
}

#[derive(Debug, Deserialize)]
pub struct CreateCaseRequest {
    pub customer_id: Option<i64>,
    pub title: Option<String>,
    pub priority: Option<Priority>,
    pub category: Option<CaseCategory>,
}

#[derive(Debug, Serialize)]
pub struct CreatedCase {
    pub message: String,
    pub case: Case,
    pub email: Email,
}

/// `POST /api/emails/{id}/create_case/`
pub async fn create_case(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(req): AppJson<CreateCaseRequest>,
) -> ApiResult<(StatusCode, Json<CreatedCase>)> {
    let actor = user.require_agent()?;
    let email = own_email(&state, actor, id).await?;
    let customer_id = req
        .customer_id
        .ok_or_else(|| ApiError::bad_request("customer_id is required"))?;

    let (case, email) = create_case_from_stored_email(
        &state.pool,
        &email,
        EmailCaseOptions {
            customer_id,
            title: req.title,
            priority: req.priority,
            category: req.category,
            ..Default::default()
        },
        actor.id,
    )
    .await?;
    tracing::info!(email_id = email.id, case_id = case.id, "Case created from email");

    Ok((
        StatusCode::CREATED,
        Json(CreatedCase {
            message: format!("Case {} created", case.case_number),
            case,
            email,
        }),
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Email>> {
    own_email(&state, &user, id).await?;
    let email = db::emails::mark_read(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email"))?;
    Ok(Json(email))
}

pub async fn toggle_star(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Email>> {
    own_email(&state, &user, id).await?;
    let email = db::emails::toggle_star(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email"))?;
    Ok(Json(email))
}

pub async fn archive(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Email>> {
    own_email(&state, &user, id).await?;
    let email = db::emails::archive(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email"))?;
    Ok(Json(email))
}

// Templates

pub async fn list_templates(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<TemplateFilter>,
) -> ApiResult<Json<Paginated<EmailTemplate>>> {
    let page = page.request();
    let count = db::email_templates::count_templates(&state.pool, &filter).await?;
    let templates = db::email_templates::list_templates(&state.pool, &filter, page).await?;
    Ok(Json(Paginated::new(count, page, templates)))
}

async fn template(state: &AppState, id: i64) -> ApiResult<EmailTemplate> {
    db::email_templates::get_template(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Email template"))
}

pub async fn get_template(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<EmailTemplate>> {
    Ok(Json(template(&state, id).await?))
}

pub async fn create_template(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(input): AppJson<EmailTemplateInput>,
) -> ApiResult<(StatusCode, Json<EmailTemplate>)> {
    let actor = user.require_agent()?;
    if input.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Template name is required"));
    }
    if input.subject.as_deref().is_none_or(|s| s.trim().is_empty()) {
        return Err(ApiError::bad_request("Template subject is required"));
    }
    let template = db::email_templates::create_template(&state.pool, &input, Some(actor.id)).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<EmailTemplateInput>,
) -> ApiResult<Json<EmailTemplate>> {
    user.require_agent()?;
    let template = db::email_templates::update_template(&state.pool, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Email template"))?;
    Ok(Json(template))
}

pub async fn delete_template(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require_agent()?;
    if !db::email_templates::delete_template(&state.pool, id).await? {
        return Err(ApiError::not_found("Email template"));
    }
    Ok(no_content())
}

#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    pub context: Option<Value>,
}

/// `POST /api/email-templates/{id}/render/`
pub async fn render_template(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<RenderedEmail>> {
    let req: RenderRequest = optional_json(&body)?;
    let template = template(&state, id).await?;
    Ok(Json(template.render(&req.context.unwrap_or_else(|| json!({})))))
}

#[derive(Debug, Deserialize)]
pub struct SendTestRequest {
    pub to_email: Option<String>,
    pub context: Option<Value>,
}

/// `POST /api/email-templates/{id}/send_test/`
pub async fn send_test(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(req): AppJson<SendTestRequest>,
) -> ApiResult<Json<Value>> {
    let actor = user.require_agent()?;
    let to = req
        .to_email
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("to_email is required"))?;
    let template = template(&state, id).await?;
    let rendered = template.render(&req.context.unwrap_or_else(templating::sample_context));

    let email = state
        .emails()
        .send_system_email(
            &to,
            &rendered.subject,
            &rendered.text_content,
            &rendered.html_content,
            None,
            Some(actor.id),
        )
        .await?;
    Ok(Json(json!({
        "message": format!("Test email sent to {to}"),
        "email_id": email.id,
    })))
}

/// `GET /api/email-templates/by_type/`
pub async fn templates_by_type(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<LabelCount>>> {
    Ok(Json(db::email_templates::count_by_type(&state.pool).await?))
}

// Per-user settings

async fn own_config(state: &AppState, user: &User, id: i64) -> ApiResult<UserEmailConfig> {
    db::email_configs::get_config(&state.pool, id)
        .await?
        .filter(|c| c.user_id == user.id)
        .ok_or_else(|| ApiError::not_found("Email configuration"))
}

pub async fn list_configs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<UserEmailConfig>>> {
    let config = db::email_configs::get_config_for_user(&state.pool, user.id).await?;
    Ok(Json(config.into_iter().collect()))
}

/// Creating a second config replaces the first: one row per user.
pub async fn save_config(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<UserEmailConfigInput>,
) -> ApiResult<(StatusCode, Json<UserEmailConfig>)> {
    if input
        .email_address
        .as_deref()
        .is_none_or(|a| !a.contains('@'))
    {
        return Err(ApiError::bad_request("A valid email_address is required"));
    }
    let config = db::email_configs::upsert_config(&state.pool, user.id, &input).await?;
    tracing::info!(user_id = user.id, config_id = config.id, "Email configuration saved");
    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn get_config(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserEmailConfig>> {
    Ok(Json(own_config(&state, &user, id).await?))
}

pub async fn update_config(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<UserEmailConfigInput>,
) -> ApiResult<Json<UserEmailConfig>> {
    own_config(&state, &user, id).await?;
    Ok(Json(
        db::email_configs::upsert_config(&state.pool, user.id, &input).await?,
    ))
}

pub async fn delete_config(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    own_config(&state, &user, id).await?;
    db::email_configs::delete_config(&state.pool, id).await?;
    Ok(no_content())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Smtp,
    Imap,
    #[default]
    Both,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestConnectionRequest {
    #[serde(default)]
    pub test_type: TestType,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckResult {
    pub success: bool,
    pub message: String,
}

async fn check_smtp(config: &UserEmailConfig) -> CheckResult {
    let outcome = match SmtpMailer::new(&SmtpSettings::from_user_config(config)) {
        Ok(mailer) => mailer.test_connection().await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(true) => CheckResult {
            success: true,
            message: "SMTP connection successful".to_string(),
        },
        Ok(false) => CheckResult {
            success: false,
            message: "SMTP server refused the connection".to_string(),
        },
        Err(e) => CheckResult {
            success: false,
            message: format!("SMTP connection failed: {e}"),
        },
    }
}

fn check_imap() -> CheckResult {
    CheckResult {
        success: false,
        message: "IMAP connections are not supported".to_string(),
    }
}

/// `POST /api/email-configs/{id}/test_connection/`
pub async fn test_connection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let req: TestConnectionRequest = optional_json(&body)?;
    let config = own_config(&state, &user, id).await?;

    let mut results = BTreeMap::new();
    if matches!(req.test_type, TestType::Smtp | TestType::Both) {
        results.insert("smtp", check_smtp(&config).await);
    }
    if matches!(req.test_type, TestType::Imap | TestType::Both) {
        results.insert("imap", check_imap());
    }
    let verified = results.values().all(|r| r.success);
    if verified != config.is_verified {
        db::email_configs::set_verified(&state.pool, id, verified).await?;
    }
    tracing::info!(config_id = id, verified, "Email configuration tested");

    Ok(Json(json!({ "results": results, "is_verified": verified })))
}

/// `POST /api/email-configs/{id}/verify/`
pub async fn verify_config(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let config = own_config(&state, &user, id).await?;
    let smtp = check_smtp(&config).await;
    db::email_configs::set_verified(&state.pool, id, smtp.success).await?;
    if smtp.success {
        Ok(message("Email configuration verified"))
    } else {
        Err(ApiError::bad_request(smtp.message))
    }
}

/// `GET /api/email-configs/providers/`
pub async fn providers(_user: CurrentUser) -> Json<Vec<ProviderDefaults>> {
    Json(EmailProvider::ALL.iter().map(EmailProvider::defaults).collect())
}
