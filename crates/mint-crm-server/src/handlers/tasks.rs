// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tasks.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};

use mint_crm_core::db;
use mint_crm_core::models::{TaskFilter, TaskInput, TaskView};

use super::{PageParams, Paginated, no_content};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

async fn task_page(
    state: &AppState,
    filter: &TaskFilter,
    overdue_at: Option<DateTime<Utc>>,
    page: PageParams,
) -> ApiResult<Paginated<TaskView>> {
    let now = Utc::now();
    let page = page.request();
    let count = db::tasks::count_tasks(&state.pool, filter, overdue_at).await?;
    let tasks = db::tasks::list_tasks(&state.pool, filter, overdue_at, page).await?;
    Ok(Paginated::new(count, page, tasks).map(|t| TaskView::new(t, now)))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<TaskFilter>,
) -> ApiResult<Json<Paginated<TaskView>>> {
    Ok(Json(task_page(&state, &filter, None, page).await?))
}

pub async fn get_task(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<TaskView>> {
    let task = db::tasks::get_task(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    Ok(Json(TaskView::new(task, Utc::now())))
}

pub async fn create_task(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(input): AppJson<TaskInput>,
) -> ApiResult<(StatusCode, Json<TaskView>)> {
    let actor = user.require_agent()?;
    if input.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Title is required"));
    }
    let task = db::tasks::create_task(&state.pool, &input, actor.id).await?;
    tracing::info!(task_id = task.id, actor_id = actor.id, "Task created");
    Ok((StatusCode::CREATED, Json(TaskView::new(task, Utc::now()))))
}

/// Moving to `completed` stamps `completed_at`; any other status clears it.
pub async fn update_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<TaskInput>,
) -> ApiResult<Json<TaskView>> {
    user.require_agent()?;
    if input.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Title is required"));
    }
    let task = db::tasks::update_task(&state.pool, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    Ok(Json(TaskView::new(task, Utc::now())))
}

pub async fn delete_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require_agent()?;
    if !db::tasks::delete_task(&state.pool, id).await? {
        return Err(ApiError::not_found("Task"));
    }
    Ok(no_content())
}

/// `GET /api/tasks/my_tasks/`
pub async fn my_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<TaskView>>> {
    let filter = TaskFilter {
        assigned_to: Some(user.id),
        ..Default::default()
    };
    Ok(Json(task_page(&state, &filter, None, page).await?))
}

/// `GET /api/tasks/overdue/`
pub async fn overdue(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<TaskView>>> {
    Ok(Json(
        task_page(&state, &TaskFilter::default(), Some(Utc::now()), page).await?,
    ))
}
