// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cases and case responses.
//!
//! Every lookup goes through the caller's [`CaseScope`], so a case outside
//! it answers 404 rather than 403.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use mint_crm_core::db::{
    self, PageRequest,
    cases::{CaseDashboard, CaseQueryExtras},
};
use mint_crm_core::models::{
    Case, CaseFilter, CaseListItem, CasePatch, CaseResponse, CaseResponseFilter, CaseResponseItem,
    CaseResponsePatch, CaseStatus, NewCase, NewCaseResponse, Priority, ResponseType, User,
};
use mint_crm_core::permissions::CaseScope;
use mint_crm_core::services::{self, AssignmentOutcome, CaseUpdateOutcome, SlaReport};

use super::{DaysParam, PageParams, Paginated, message, no_content, optional_json};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

/// Responses embedded in a case detail.
const DETAIL_RESPONSE_LIMIT: i64 = 500;

#[derive(Debug, Serialize)]
pub struct CaseDetail {
    #[serde(flatten)]
    pub item: CaseListItem,
    pub responses: Vec<CaseResponseItem>,
    pub is_overdue: bool,
    pub priority_score: i32,
    pub sla_breach: bool,
}

async fn visible_case(state: &AppState, user: &User, id: i64) -> ApiResult<CaseListItem> {
    db::cases::get_visible_case(&state.pool, id, CaseScope::for_user(user))
        .await?
        .ok_or_else(|| ApiError::not_found("Case"))
}

async fn case_page(
    state: &AppState,
    user: &User,
    filter: &CaseFilter,
    extras: CaseQueryExtras,
    page: PageParams,
) -> ApiResult<Paginated<CaseListItem>> {
    let scope = CaseScope::for_user(user);
    let page = page.request();
    let count = db::cases::count_cases(&state.pool, filter, scope, extras).await?;
    let cases = db::cases::list_cases(&state.pool, filter, scope, extras, page).await?;
    Ok(Paginated::new(count, page, cases))
}

pub async fn list_cases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<CaseFilter>,
) -> ApiResult<Json<Paginated<CaseListItem>>> {
    Ok(Json(
        case_page(&state, &user, &filter, CaseQueryExtras::default(), page).await?,
    ))
}

pub async fn get_case(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<CaseDetail>> {
    let item = visible_case(&state, &user, id).await?;
    let filter = CaseResponseFilter {
        case: Some(id),
        ..Default::default()
    };
    let responses = db::case_responses::list_responses(
        &state.pool,
        &filter,
        CaseScope::for_user(&user),
        PageRequest::first(DETAIL_RESPONSE_LIMIT),
    )
    .await?;

    let now = Utc::now();
    Ok(Json(CaseDetail {
        is_overdue: item.case.is_overdue(now),
        priority_score: item.case.priority_score(),
        sla_breach: item.case.sla_breach(now),
        item,
        responses,
    }))
}

pub async fn create_case(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(input): AppJson<NewCase>,
) -> ApiResult<(StatusCode, Json<Case>)> {
    let actor = user.require_agent()?;
    input.validate()?;
    if db::contacts::get_contact(&state.pool, input.customer_id)
        .await?
        .is_none()
    {
        return Err(ApiError::bad_request("Customer does not exist"));
    }

    let case = db::cases::create_case(&state.pool, &input, actor.id).await?;
    tracing::info!(
        case_id = case.id,
        case_number = %case.case_number,
        actor_id = actor.id,
        "Case created"
    );
    Ok((StatusCode::CREATED, Json(case)))
}

pub async fn update_case(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<CasePatch>,
) -> ApiResult<Json<Case>> {
    let actor = user.require_agent()?;
    visible_case(&state, actor, id).await?;
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Title is required"));
    }
    if patch.sla_hours.is_some_and(|h| h <= 0) {
        return Err(ApiError::bad_request("SLA hours must be positive"));
    }
    if let Some(Some(assignee_id)) = patch.assigned_to_id {
        services::assignment::assignable_user(&state.pool, assignee_id).await?;
    }

    let case = db::cases::update_case(&state.pool, id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Case"))?;
    Ok(Json(case))
}

pub async fn delete_case(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let actor = user.require_agent()?;
    visible_case(&state, actor, id).await?;
    if !db::cases::delete_case(&state.pool, id).await? {
        return Err(ApiError::not_found("Case"));
    }
    tracing::info!(case_id = id, actor_id = actor.id, "Case deleted");
    Ok(no_content())
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assigned_to: i64,
    pub reason: Option<String>,
}

/// `POST /api/cases/{id}/assign/`
pub async fn assign(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(body): AppJson<AssignRequest>,
) -> ApiResult<Json<AssignmentOutcome>> {
    let actor = user.require_agent()?;
    visible_case(&state, actor, id).await?;
    let outcome = services::assign_case(
        &state.pool,
        &state.notifier,
        id,
        body.assigned_to,
        actor,
        body.reason.as_deref(),
    )
    .await?;
    Ok(Json(outcome))
}

/// `POST /api/cases/{id}/auto_assign/`
pub async fn auto_assign(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<AssignmentOutcome>> {
    let actor = user.require_agent()?;
    visible_case(&state, actor, id).await?;
    Ok(Json(
        services::auto_assign(&state.pool, &state.notifier, id, actor).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct PriorityRequest {
    pub priority: Priority,
    pub reason: Option<String>,
}

/// `POST /api/cases/{id}/update_priority/`
pub async fn update_priority(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(body): AppJson<PriorityRequest>,
) -> ApiResult<Json<CaseUpdateOutcome>> {
    let actor = user.require_agent()?;
    visible_case(&state, actor, id).await?;
    Ok(Json(
        services::update_priority(&state.pool, id, body.priority, actor, body.reason.as_deref())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: CaseStatus,
    pub note: Option<String>,
}

/// `POST /api/cases/{id}/update_status/`
pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(body): AppJson<StatusRequest>,
) -> ApiResult<Json<CaseUpdateOutcome>> {
    let actor = user.require_agent()?;
    visible_case(&state, actor, id).await?;
    Ok(Json(
        services::update_status(
            &state.pool,
            &state.notifier,
            id,
            body.status,
            actor,
            body.note.as_deref(),
        )
        .await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct EscalateRequest {
    pub reason: Option<String>,
}

/// `POST /api/cases/{id}/escalate/`
pub async fn escalate(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<AssignmentOutcome>> {
    let actor = user.require_agent()?;
    visible_case(&state, actor, id).await?;
    let body: EscalateRequest = optional_json(&body)?;
    Ok(Json(
        services::escalate_case(&state.pool, &state.notifier, id, actor, body.reason.as_deref())
            .await?,
    ))
}

/// `GET /api/cases/dashboard_stats/?days=30`
pub async fn dashboard_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(days): AppQuery<DaysParam>,
) -> ApiResult<Json<CaseDashboard>> {
    let stats = db::cases::dashboard_stats(
        &state.pool,
        CaseScope::for_user(&user),
        days.since(Utc::now()),
    )
    .await?;
    Ok(Json(stats))
}

/// `GET /api/cases/my_cases/`
///
/// Customers get the cases of their contact record, staff the cases
/// assigned to them.
pub async fn my_cases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<CaseListItem>>> {
    let filter = if user.is_customer() {
        CaseFilter::default()
    } else {
        CaseFilter {
            assigned_to: Some(user.id),
            ..Default::default()
        }
    };
    Ok(Json(
        case_page(&state, &user, &filter, CaseQueryExtras::default(), page).await?,
    ))
}

/// `GET /api/cases/urgent_cases/`
pub async fn urgent_cases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<CaseListItem>>> {
    let extras = CaseQueryExtras {
        urgent_only: true,
        ..Default::default()
    };
    Ok(Json(
        case_page(&state, &user, &CaseFilter::default(), extras, page).await?,
    ))
}

/// `GET /api/cases/{id}/sla/`
pub async fn sla(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<SlaReport>> {
    visible_case(&state, &user, id).await?;
    let report = services::sla::refresh(&state.pool, id, Utc::now())
        .await?
        .ok_or_else(|| ApiError::not_found("Case"))?;
    Ok(Json(report))
}

// Case responses

pub async fn list_responses(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<CaseResponseFilter>,
) -> ApiResult<Json<Paginated<CaseResponseItem>>> {
    let scope = CaseScope::for_user(&user);
    let page = page.request();
    let count = db::case_responses::count_responses(&state.pool, &filter, scope).await?;
    let responses = db::case_responses::list_responses(&state.pool, &filter, scope, page).await?;
    Ok(Json(Paginated::new(count, page, responses)))
}

async fn visible_response(state: &AppState, user: &User, id: i64) -> ApiResult<CaseResponseItem> {
    db::case_responses::get_visible_response(&state.pool, id, CaseScope::for_user(user))
        .await?
        .ok_or_else(|| ApiError::not_found("Case response"))
}

pub async fn get_response(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<CaseResponseItem>> {
    Ok(Json(visible_response(&state, &user, id).await?))
}

/// `POST /api/case-responses/`
///
/// Customers may post on their own cases; their responses are always
/// customer-facing. A staff `customer` response notifies the customer unless
/// it is kept internal.
pub async fn create_response(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(mut input): AppJson<NewCaseResponse>,
) -> ApiResult<(StatusCode, Json<CaseResponse>)> {
    if input.content.trim().is_empty() {
        return Err(ApiError::bad_request("Content is required"));
    }
    let case = visible_case(&state, &user, input.case_id).await?.case;

    if user.is_customer() {
        input.response_type = ResponseType::Customer;
        input.is_internal = Some(false);
    }

    let response = db::case_responses::create_response(&state.pool, &input, user.id).await?;
    tracing::info!(
        response_id = response.id,
        case_id = case.id,
        response_type = response.response_type.as_str(),
        "Case response created"
    );

    let customer_facing = response.response_type == ResponseType::Customer && !response.is_internal;
    if user.is_agent() && customer_facing {
        state
            .notifier
            .case_response(&case, &response, Some(&user))
            .await;
    }

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_response(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<CaseResponsePatch>,
) -> ApiResult<Json<CaseResponse>> {
    let actor = user.require_agent()?;
    visible_response(&state, actor, id).await?;
    if patch.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(ApiError::bad_request("Content is required"));
    }
    let response = db::case_responses::update_response(&state.pool, id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Case response"))?;
    Ok(Json(response))
}

pub async fn delete_response(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let actor = user.require_agent()?;
    visible_response(&state, actor, id).await?;
    if !db::case_responses::delete_response(&state.pool, id).await? {
        return Err(ApiError::not_found("Case response"));
    }
    Ok(no_content())
}

/// `POST /api/case-responses/{id}/send_email/`
pub async fn send_response_email(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let actor = user.require_agent()?;
    let item = visible_response(&state, actor, id).await?;
    if item.response.email_sent {
        return Err(ApiError::bad_request("Email already sent"));
    }
    let case = db::cases::get_case(&state.pool, item.response.case_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Case"))?;

    if !state
        .notifier
        .response_email(&case, &item.response, Some(actor))
        .await
    {
        return Err(ApiError::Internal("Failed to send email".to_string()));
    }
    db::case_responses::mark_email_sent(&state.pool, id, None).await?;
    Ok(message("Email sent successfully"))
}
