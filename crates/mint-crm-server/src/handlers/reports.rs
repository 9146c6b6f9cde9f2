// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Report definitions, on-demand generation and export. Staff only.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use mint_crm_core::db;
use mint_crm_core::models::{Report, ReportExecution, ReportFilter, ReportInput};
use mint_crm_core::reports;

use super::{PageParams, Paginated, no_content};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

async fn report(state: &AppState, id: i64) -> ApiResult<Report> {
    db::reports::get_report(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Report"))
}

pub async fn list_reports(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<ReportFilter>,
) -> ApiResult<Json<Paginated<Report>>> {
    user.require_agent()?;
    let page = page.request();
    let count = db::reports::count_reports(&state.pool, &filter).await?;
    let rows = db::reports::list_reports(&state.pool, &filter, page).await?;
    Ok(Json(Paginated::new(count, page, rows)))
}

pub async fn get_report(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Report>> {
    user.require_agent()?;
    Ok(Json(report(&state, id).await?))
}

pub async fn create_report(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(input): AppJson<ReportInput>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    let actor = user.require_agent()?;
    if input.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Report name is required"));
    }
    input.validate_parameters()?;
    let report = db::reports::create_report(&state.pool, &input, actor.id).await?;
    tracing::info!(
        report_id = report.id,
        report_type = report.report_type.as_str(),
        "Report created"
    );
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn update_report(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<ReportInput>,
) -> ApiResult<Json<Report>> {
    user.require_agent()?;
    if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Report name is required"));
    }
    input.validate_parameters()?;
    let report = db::reports::update_report(&state.pool, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Report"))?;
    Ok(Json(report))
}

pub async fn delete_report(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require_agent()?;
    if !db::reports::delete_report(&state.pool, id).await? {
        return Err(ApiError::not_found("Report"));
    }
    Ok(no_content())
}

/// `POST /api/reports/{id}/generate/`
///
/// A failing generator still answers 200 with a `failed` execution.
pub async fn generate(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ReportExecution>> {
    user.require_agent()?;
    let report = report(&state, id).await?;
    let execution = reports::run_report(&state.pool, &report).await?;
    Ok(Json(execution))
}

/// `GET /api/reports/{id}/executions/`
pub async fn executions(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<ReportExecution>>> {
    user.require_agent()?;
    report(&state, id).await?;
    let page = page.request();
    let count = db::reports::count_executions(&state.pool, id).await?;
    let rows = db::reports::list_executions(&state.pool, id, page).await?;
    Ok(Json(Paginated::new(count, page, rows)))
}

/// `GET /api/reports/{id}/export/`: latest completed execution as a download.
pub async fn export(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    user.require_agent()?;
    let report = report(&state, id).await?;
    let execution = db::reports::latest_completed_execution(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Completed execution"))?;
    let export = reports::export(&report, &execution)?;

    Ok((
        [
            (header::CONTENT_TYPE, export.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.file_name),
            ),
        ],
        export.body,
    )
        .into_response())
}
