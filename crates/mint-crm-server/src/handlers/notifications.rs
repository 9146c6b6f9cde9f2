// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-app notifications. Every route only ever touches the caller's own rows.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use mint_crm_core::db;
use mint_crm_core::models::{Notification, NotificationFilter};

use super::{PageParams, Paginated, no_content};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::AppQuery;
use crate::state::AppState;

pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<NotificationFilter>,
) -> ApiResult<Json<Paginated<Notification>>> {
    let page = page.request();
    let count = db::notifications::count_notifications(&state.pool, user.id, &filter).await?;
    let rows = db::notifications::list_notifications(&state.pool, user.id, &filter, page).await?;
    Ok(Json(Paginated::new(count, page, rows)))
}

pub async fn get_notification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Notification>> {
    let notification = db::notifications::get_notification(&state.pool, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification"))?;
    Ok(Json(notification))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !db::notifications::delete_notification(&state.pool, id, user.id).await? {
        return Err(ApiError::not_found("Notification"));
    }
    Ok(no_content())
}

/// `POST /api/notifications/{id}/mark_read/`
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Notification>> {
    let notification = db::notifications::mark_read(&state.pool, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification"))?;
    Ok(Json(notification))
}

/// `POST /api/notifications/mark_all_read/`
pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Value>> {
    let updated = db::notifications::mark_all_read(&state.pool, user.id).await?;
    Ok(Json(json!({
        "message": format!("{updated} notifications marked as read"),
        "updated": updated,
    })))
}

/// `GET /api/notifications/unread_count/`
pub async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Value>> {
    let count = db::notifications::unread_count(&state.pool, user.id).await?;
    Ok(Json(json!({ "unread_count": count })))
}
