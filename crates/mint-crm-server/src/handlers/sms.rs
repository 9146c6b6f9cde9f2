// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SMS messages, SMS templates and per-user SMS provider settings.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use mint_crm_core::db::{self, sms::SmsStats};
use mint_crm_core::messaging::{BulkSmsResult, BulkStatus};
use mint_crm_core::models::{
    Sms, SmsFilter, SmsProvider, SmsTemplate, SmsTemplateInput, TemplateFilter, User,
    UserSmsConfig, UserSmsConfigInput, validate_message,
};
use mint_crm_core::permissions::{CaseScope, SmsScope};
use mint_crm_core::templating;

use super::{DaysParam, PageParams, Paginated, no_content, optional_json};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

const DEFAULT_TEST_MESSAGE: &str = "Test SMS from MINTT CRM";

async fn visible_sms(state: &AppState, user: &User, id: i64) -> ApiResult<Sms> {
    db::sms::get_visible_sms(&state.pool, id, SmsScope::for_user(user))
        .await?
        .ok_or_else(|| ApiError::not_found("SMS"))
}

async fn check_case(state: &AppState, user: &User, case_id: Option<i64>) -> ApiResult<()> {
    if let Some(case_id) = case_id {
        db::cases::get_visible_case(&state.pool, case_id, CaseScope::for_user(user))
            .await?
            .ok_or_else(|| ApiError::not_found("Case"))?;
    }
    Ok(())
}

pub async fn list_sms(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<SmsFilter>,
) -> ApiResult<Json<Paginated<Sms>>> {
    let scope = SmsScope::for_user(&user);
    let page = page.request();
    let count = db::sms::count_sms(&state.pool, &filter, scope).await?;
    let messages = db::sms::list_sms(&state.pool, &filter, scope, page).await?;
    Ok(Json(Paginated::new(count, page, messages)))
}

pub async fn get_sms(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Sms>> {
    Ok(Json(visible_sms(&state, &user, id).await?))
}

pub async fn delete_sms(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    visible_sms(&state, &user, id).await?;
    db::sms::delete_sms(&state.pool, id).await?;
    Ok(no_content())
}

#[derive(Debug, Deserialize)]
pub struct SendSmsRequest {
    pub to_number: Option<String>,
    #[serde(default)]
    pub message: String,
    pub case_id: Option<i64>,
    pub contact_id: Option<i64>,
}

/// `POST /api/sms/send_sms/`
///
/// The message is recorded either way; a gateway failure shows up as a
/// `failed` record rather than an error response.
pub async fn send_sms(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(req): AppJson<SendSmsRequest>,
) -> ApiResult<(StatusCode, Json<Sms>)> {
    let to = req
        .to_number
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("to_number is required"))?;
    validate_message(&req.message)?;
    check_case(&state, &user, req.case_id).await?;

    let sms = state
        .sms()
        .send_to_number(user.id, &to, &req.message, req.case_id, req.contact_id)
        .await?;
    tracing::info!(sms_id = sms.id, status = sms.status.as_str(), "SMS sent on request");
    Ok((StatusCode::CREATED, Json(sms)))
}

/// `POST /api/sms/{id}/resend/`
pub async fn resend(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Sms>> {
    let sms = visible_sms(&state, &user, id).await?;
    Ok(Json(state.sms().resend(sms).await?))
}

#[derive(Debug, Deserialize)]
pub struct BulkSmsRequest {
    #[serde(default)]
    pub user_ids: Vec<i64>,
    #[serde(default)]
    pub message: String,
    pub case_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BulkSmsResponse {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub no_phone: usize,
    pub results: Vec<BulkSmsResult>,
}

impl BulkSmsResponse {
    fn new(results: Vec<BulkSmsResult>) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            total: results.len(),
            sent: count(BulkStatus::Sent),
            failed: count(BulkStatus::Failed),
            no_phone: count(BulkStatus::NoPhone),
            results,
        }
    }
}

/// `POST /api/sms/send_bulk/`
pub async fn send_bulk(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<BulkSmsRequest>,
) -> ApiResult<Json<BulkSmsResponse>> {
    let actor = user.require_agent()?;
    if req.user_ids.is_empty() {
        return Err(ApiError::bad_request("user_ids is required"));
    }
    validate_message(&req.message)?;
    check_case(&state, actor, req.case_id).await?;

    let results = state
        .sms()
        .send_bulk(&req.user_ids, &req.message, req.case_id)
        .await?;
    let response = BulkSmsResponse::new(results);
    tracing::info!(
        actor_id = actor.id,
        sent = response.sent,
        failed = response.failed,
        "Bulk SMS finished"
    );
    Ok(Json(response))
}

/// `GET /api/sms/stats/?days=30`
pub async fn sms_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(days): AppQuery<DaysParam>,
) -> ApiResult<Json<SmsStats>> {
    let stats = db::sms::sms_stats(
        &state.pool,
        SmsScope::for_user(&user),
        days.since(Utc::now()),
    )
    .await?;
    Ok(Json(stats))
}

pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Sms>> {
    visible_sms(&state, &user, id).await?;
    let sms = db::sms::mark_read(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("SMS"))?;
    Ok(Json(sms))
}

pub async fn toggle_star(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Sms>> {
    visible_sms(&state, &user, id).await?;
    let sms = db::sms::toggle_star(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("SMS"))?;
    Ok(Json(sms))
}

// Templates, manager and admin only.

async fn template(state: &AppState, id: i64) -> ApiResult<SmsTemplate> {
    db::sms_templates::get_template(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("SMS template"))
}

pub async fn list_templates(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<TemplateFilter>,
) -> ApiResult<Json<Paginated<SmsTemplate>>> {
    user.require_manager()?;
    let page = page.request();
    let count = db::sms_templates::count_templates(&state.pool, &filter).await?;
    let templates = db::sms_templates::list_templates(&state.pool, &filter, page).await?;
    Ok(Json(Paginated::new(count, page, templates)))
}

pub async fn get_template(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<SmsTemplate>> {
    user.require_manager()?;
    Ok(Json(template(&state, id).await?))
}

pub async fn create_template(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(input): AppJson<SmsTemplateInput>,
) -> ApiResult<(StatusCode, Json<SmsTemplate>)> {
    let actor = user.require_manager()?;
    if input.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Template name is required"));
    }
    if input.message.is_none() {
        return Err(ApiError::bad_request("Message is required"));
    }
    input.validate()?;
    let template = db::sms_templates::create_template(&state.pool, &input, Some(actor.id)).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<SmsTemplateInput>,
) -> ApiResult<Json<SmsTemplate>> {
    user.require_manager()?;
    input.validate()?;
    let template = db::sms_templates::update_template(&state.pool, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("SMS template"))?;
    Ok(Json(template))
}

pub async fn delete_template(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require_manager()?;
    if !db::sms_templates::delete_template(&state.pool, id).await? {
        return Err(ApiError::not_found("SMS template"));
    }
    Ok(no_content())
}

#[derive(Debug, Deserialize)]
pub struct TemplateTestRequest {
    pub test_phone: Option<String>,
}

/// `POST /api/sms-templates/{id}/test/`
pub async fn test_template(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(req): AppJson<TemplateTestRequest>,
) -> ApiResult<Json<Sms>> {
    let actor = user.require_manager()?;
    let phone = req
        .test_phone
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("test_phone is required"))?;
    let template = template(&state, id).await?;
    let rendered = template.render(&templating::sample_context());
    validate_message(&rendered)?;

    let sms = state
        .sms()
        .send_to_number(actor.id, &phone, &rendered, None, None)
        .await?;
    Ok(Json(sms))
}

// Per-user provider settings

async fn own_config(state: &AppState, user: &User, id: i64) -> ApiResult<UserSmsConfig> {
    db::sms_configs::get_config(&state.pool, id)
        .await?
        .filter(|c| c.user_id == user.id)
        .ok_or_else(|| ApiError::not_found("SMS configuration"))
}

pub async fn list_configs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<UserSmsConfig>>> {
    let config = db::sms_configs::get_config_for_user(&state.pool, user.id).await?;
    Ok(Json(config.into_iter().collect()))
}

pub async fn save_config(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<UserSmsConfigInput>,
) -> ApiResult<(StatusCode, Json<UserSmsConfig>)> {
    let config = db::sms_configs::upsert_config(&state.pool, user.id, &input).await?;
    tracing::info!(user_id = user.id, config_id = config.id, "SMS configuration saved");
    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn get_config(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserSmsConfig>> {
    Ok(Json(own_config(&state, &user, id).await?))
}

pub async fn update_config(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<UserSmsConfigInput>,
) -> ApiResult<Json<UserSmsConfig>> {
    own_config(&state, &user, id).await?;
    Ok(Json(
        db::sms_configs::upsert_config(&state.pool, user.id, &input).await?,
    ))
}

pub async fn delete_config(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    own_config(&state, &user, id).await?;
    db::sms_configs::delete_config(&state.pool, id).await?;
    Ok(no_content())
}

/// `POST /api/sms-configs/{id}/verify/`
pub async fn verify_config(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let config = own_config(&state, &user, id).await?;
    let missing = config.missing_credentials();
    let verified = missing.is_empty();
    db::sms_configs::set_verified(&state.pool, id, verified).await?;

    if verified {
        Ok(Json(json!({
            "message": "SMS configuration verified",
            "is_verified": true,
        })))
    } else {
        Err(ApiError::bad_request(format!(
            "{} configuration requires {}",
            config.provider.label(),
            missing.join(", ")
        )))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TestConnectionRequest {
    pub test_phone: Option<String>,
    pub test_message: Option<String>,
}

/// `POST /api/sms-configs/{id}/test_connection/`
pub async fn test_connection(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let req: TestConnectionRequest = optional_json(&body)?;
    own_config(&state, &user, id).await?;
    let phone = req
        .test_phone
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("test_phone is required"))?;
    let message = req
        .test_message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TEST_MESSAGE.to_string());
    validate_message(&message)?;

    match state.sms().send_raw(&phone, &message).await {
        Ok(result) => Ok(Json(json!({
            "success": true,
            "message": format!("Test SMS sent to {phone}"),
            "result": result,
        }))),
        Err(e) => {
            tracing::warn!(config_id = id, error = %e, "SMS test failed");
            Err(ApiError::bad_request(format!("SMS test failed: {e}")))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub provider: SmsProvider,
    pub name: &'static str,
    pub required_fields: &'static [&'static str],
}

/// `GET /api/sms-configs/providers/`
pub async fn providers(_user: CurrentUser) -> Json<Vec<ProviderInfo>> {
    Json(
        SmsProvider::ALL
            .iter()
            .map(|p| ProviderInfo {
                provider: *p,
                name: p.label(),
                required_fields: p.required_fields(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(user_id: i64, status: BulkStatus) -> BulkSmsResult {
        BulkSmsResult {
            user_id,
            phone: None,
            status,
            sms_id: None,
        }
    }

    #[test]
    fn test_bulk_response_counts() {
        let response = BulkSmsResponse::new(vec![
            result(1, BulkStatus::Sent),
            result(2, BulkStatus::Sent),
            result(3, BulkStatus::NoPhone),
            result(4, BulkStatus::Failed),
        ]);
        assert_eq!(response.total, 4);
        assert_eq!(response.sent, 2);
        assert_eq!(response.failed, 1);
        assert_eq!(response.no_phone, 1);
    }
}
