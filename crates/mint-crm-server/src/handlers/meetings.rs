// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Meetings, meeting categories, attendance, reminders and templates.
//!
//! Non-managers see a meeting when they organise it, attend it, or it is not
//! private. Hidden meetings answer 404.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use mint_crm_core::db::{self, meetings::MeetingStats};
use mint_crm_core::models::{
    AttendanceStatus, Meeting, MeetingAttendance, MeetingCategory, MeetingCategoryInput,
    MeetingFilter, MeetingInput, MeetingReminder, MeetingStatus, MeetingTemplate,
    MeetingTemplateInput, MeetingType, MeetingView, User,
};
use mint_crm_core::permissions::MeetingScope;

use super::{PageParams, Paginated, no_content, optional_json};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

async fn views(state: &AppState, meetings: Vec<Meeting>) -> ApiResult<Vec<MeetingView>> {
    let now = Utc::now();
    let mut out = Vec::with_capacity(meetings.len());
    for meeting in meetings {
        let attendees = db::meetings::attendee_ids(&state.pool, meeting.id).await?;
        out.push(MeetingView::new(meeting, attendees, now));
    }
    Ok(out)
}

async fn view(state: &AppState, meeting: Meeting) -> ApiResult<MeetingView> {
    let attendees = db::meetings::attendee_ids(&state.pool, meeting.id).await?;
    Ok(MeetingView::new(meeting, attendees, Utc::now()))
}

async fn visible_meeting(state: &AppState, user: &User, id: i64) -> ApiResult<Meeting> {
    db::meetings::get_visible_meeting(&state.pool, id, MeetingScope::for_user(user))
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting"))
}

async fn meeting_page(
    state: &AppState,
    user: &User,
    filter: &MeetingFilter,
    page: PageParams,
) -> ApiResult<Paginated<MeetingView>> {
    let scope = MeetingScope::for_user(user);
    let page = page.request();
    let count = db::meetings::count_meetings(&state.pool, filter, scope).await?;
    let meetings = db::meetings::list_meetings(&state.pool, filter, scope, page).await?;
    let results = views(state, meetings).await?;
    Ok(Paginated::new(count, page, results))
}

pub async fn list_meetings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<MeetingFilter>,
) -> ApiResult<Json<Paginated<MeetingView>>> {
    Ok(Json(meeting_page(&state, &user, &filter, page).await?))
}

pub async fn get_meeting(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MeetingView>> {
    let meeting = visible_meeting(&state, &user, id).await?;
    Ok(Json(view(&state, meeting).await?))
}

/// Organizer sets itself; attendees are invited and reminders scheduled.
pub async fn create_meeting(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(input): AppJson<MeetingInput>,
) -> ApiResult<(StatusCode, Json<MeetingView>)> {
    if input.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Title is required"));
    }
    let start = input
        .start_time
        .ok_or_else(|| ApiError::bad_request("start_time is required"))?;
    let end = input
        .end_time
        .ok_or_else(|| ApiError::bad_request("end_time is required"))?;
    MeetingInput::validate_window(start, end)?;
    if input.reminder_minutes.is_some_and(|m| m < 0) {
        return Err(ApiError::bad_request("reminder_minutes cannot be negative"));
    }

    let meeting = db::meetings::create_meeting(&state.pool, &input, user.id, start, end).await?;
    tracing::info!(meeting_id = meeting.id, organizer_id = user.id, "Meeting created");
    Ok((StatusCode::CREATED, Json(view(&state, meeting).await?)))
}

fn can_manage(user: &User, meeting: &Meeting) -> bool {
    user.is_manager() || meeting.organizer_id == user.id
}

pub async fn update_meeting(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<MeetingInput>,
) -> ApiResult<Json<MeetingView>> {
    let existing = visible_meeting(&state, &user, id).await?;
    if !can_manage(&user, &existing) {
        return Err(ApiError::forbidden());
    }
    if input.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Title is required"));
    }
    MeetingInput::validate_window(
        input.start_time.unwrap_or(existing.start_time),
        input.end_time.unwrap_or(existing.end_time),
    )?;

    let meeting = db::meetings::update_meeting(&state.pool, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting"))?;
    Ok(Json(view(&state, meeting).await?))
}

pub async fn delete_meeting(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let existing = visible_meeting(&state, &user, id).await?;
    if !can_manage(&user, &existing) {
        return Err(ApiError::forbidden());
    }
    db::meetings::delete_meeting(&state.pool, id).await?;
    Ok(no_content())
}

/// `POST /api/meetings/{id}/join/`
pub async fn join(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MeetingAttendance>> {
    visible_meeting(&state, &user, id).await?;
    let attendance = db::meetings::mark_joined(&state.pool, id, user.id)
        .await?
        .ok_or_else(|| ApiError::bad_request("You are not an attendee of this meeting"))?;
    tracing::info!(meeting_id = id, user_id = user.id, "Joined meeting");
    Ok(Json(attendance))
}

/// `POST /api/meetings/{id}/leave/`
pub async fn leave(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MeetingAttendance>> {
    visible_meeting(&state, &user, id).await?;
    let attendance = db::meetings::mark_left(&state.pool, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record"))?;
    Ok(Json(attendance))
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    pub outcome: Option<String>,
}

async fn organizer_transition(
    state: &AppState,
    user: &User,
    id: i64,
    status: MeetingStatus,
    outcome: Option<&str>,
) -> ApiResult<MeetingView> {
    let meeting = visible_meeting(state, user, id).await?;
    if meeting.organizer_id != user.id {
        return Err(ApiError::Forbidden(
            "Only the organizer can change the meeting status".to_string(),
        ));
    }
    let meeting = db::meetings::set_status(&state.pool, id, status, outcome)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting"))?;
    tracing::info!(meeting_id = id, status = status.as_str(), "Meeting status changed");
    view(state, meeting).await
}

/// `POST /api/meetings/{id}/complete/`
pub async fn complete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<MeetingView>> {
    let req: CompleteRequest = optional_json(&body)?;
    Ok(Json(
        organizer_transition(
            &state,
            &user,
            id,
            MeetingStatus::Completed,
            req.outcome.as_deref(),
        )
        .await?,
    ))
}

/// `POST /api/meetings/{id}/cancel/`
pub async fn cancel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MeetingView>> {
    Ok(Json(
        organizer_transition(&state, &user, id, MeetingStatus::Cancelled, None).await?,
    ))
}

/// Midnight UTC at the start of `now`'s day.
fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|d| d.and_utc())
        .unwrap_or(now)
}

/// `GET /api/meetings/today/`
pub async fn today(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<MeetingView>>> {
    let start = day_start(Utc::now());
    let filter = MeetingFilter {
        start_after: Some(start),
        start_before: Some(start + Duration::days(1)),
        ordering: Some("start_time".to_string()),
        ..Default::default()
    };
    Ok(Json(meeting_page(&state, &user, &filter, page).await?))
}

/// `GET /api/meetings/upcoming/`
pub async fn upcoming(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<MeetingView>>> {
    let filter = MeetingFilter {
        start_after: Some(Utc::now()),
        ordering: Some("start_time".to_string()),
        ..Default::default()
    };
    Ok(Json(meeting_page(&state, &user, &filter, page).await?))
}

/// `GET /api/meetings/past/`
pub async fn past(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<MeetingView>>> {
    let filter = MeetingFilter {
        end_before: Some(Utc::now()),
        ordering: Some("-start_time".to_string()),
        ..Default::default()
    };
    Ok(Json(meeting_page(&state, &user, &filter, page).await?))
}

/// `GET /api/meetings/stats/`
pub async fn stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<MeetingStats>> {
    let stats =
        db::meetings::meeting_stats(&state.pool, MeetingScope::for_user(&user), Utc::now()).await?;
    Ok(Json(stats))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    pub title: Option<String>,
    pub meeting_type: Option<MeetingType>,
    pub status: Option<MeetingStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl SearchRequest {
    fn into_filter(self) -> MeetingFilter {
        MeetingFilter {
            search: self.title.filter(|t| !t.trim().is_empty()),
            meeting_type: self.meeting_type,
            status: self.status,
            start_after: self.start_date,
            start_before: self.end_date,
            ordering: Some("start_time".to_string()),
            ..Default::default()
        }
    }
}

/// `POST /api/meetings/search/`
pub async fn search(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    body: Bytes,
) -> ApiResult<Json<Paginated<MeetingView>>> {
    let req: SearchRequest = optional_json(&body)?;
    let filter = req.into_filter();
    Ok(Json(meeting_page(&state, &user, &filter, page).await?))
}

// Categories

/// `#RRGGBB`.
fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn validate_category(input: &MeetingCategoryInput, creating: bool) -> ApiResult<()> {
    let blank_name = input.name.as_deref().map(|n| n.trim().is_empty());
    if blank_name == Some(true) || (creating && blank_name.is_none()) {
        return Err(ApiError::bad_request("Category name is required"));
    }
    if input.color.as_deref().is_some_and(|c| !is_hex_color(c)) {
        return Err(ApiError::bad_request("Color must be a hex value like #3B82F6"));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct ActiveParam {
    pub is_active: Option<bool>,
}

async fn category_page(
    state: &AppState,
    is_active: Option<bool>,
    page: PageParams,
) -> ApiResult<Paginated<MeetingCategory>> {
    let page = page.request();
    let count = db::meetings::count_categories(&state.pool, is_active).await?;
    let rows = db::meetings::list_categories(&state.pool, is_active, page).await?;
    Ok(Paginated::new(count, page, rows))
}

pub async fn list_categories(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(active): AppQuery<ActiveParam>,
) -> ApiResult<Json<Paginated<MeetingCategory>>> {
    Ok(Json(category_page(&state, active.is_active, page).await?))
}

/// `GET /api/meeting-categories/active/`
pub async fn active_categories(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<MeetingCategory>>> {
    Ok(Json(category_page(&state, Some(true), page).await?))
}

pub async fn get_category(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MeetingCategory>> {
    let category = db::meetings::get_category(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting category"))?;
    Ok(Json(category))
}

pub async fn create_category(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(input): AppJson<MeetingCategoryInput>,
) -> ApiResult<(StatusCode, Json<MeetingCategory>)> {
    let actor = user.require_agent()?;
    validate_category(&input, true)?;
    let category = db::meetings::create_category(&state.pool, &input, actor.id).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<MeetingCategoryInput>,
) -> ApiResult<Json<MeetingCategory>> {
    user.require_agent()?;
    validate_category(&input, false)?;
    let category = db::meetings::update_category(&state.pool, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting category"))?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require_agent()?;
    if !db::meetings::delete_category(&state.pool, id).await? {
        return Err(ApiError::not_found("Meeting category"));
    }
    Ok(no_content())
}

// Attendance

#[derive(Debug, Default, Deserialize)]
pub struct AttendanceParams {
    pub meeting: Option<i64>,
}

/// Managers see every attendance row, everyone else only their own.
fn attendance_owner(user: &User) -> Option<i64> {
    if user.is_manager() { None } else { Some(user.id) }
}

pub async fn list_attendance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(params): AppQuery<AttendanceParams>,
) -> ApiResult<Json<Paginated<MeetingAttendance>>> {
    let owner = attendance_owner(&user);
    let page = page.request();
    let count = db::meetings::count_attendance(&state.pool, owner, params.meeting).await?;
    let rows = db::meetings::list_attendance(&state.pool, owner, params.meeting, page).await?;
    Ok(Json(Paginated::new(count, page, rows)))
}

async fn own_attendance(state: &AppState, user: &User, id: i64) -> ApiResult<MeetingAttendance> {
    db::meetings::get_attendance_by_id(&state.pool, id)
        .await?
        .filter(|a| attendance_owner(user).is_none_or(|owner| owner == a.user_id))
        .ok_or_else(|| ApiError::not_found("Attendance record"))
}

pub async fn get_attendance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MeetingAttendance>> {
    Ok(Json(own_attendance(&state, &user, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub status: AttendanceStatus,
}

/// `POST /api/meeting-attendance/{id}/respond/`
pub async fn respond(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    AppJson(req): AppJson<RespondRequest>,
) -> ApiResult<Json<MeetingAttendance>> {
    let attendance = own_attendance(&state, &user, id).await?;
    if attendance.user_id != user.id {
        return Err(ApiError::Forbidden(
            "You can only respond to your own invitations".to_string(),
        ));
    }
    if !req.status.is_rsvp() {
        return Err(ApiError::bad_request(
            "Status must be one of accepted, declined, tentative",
        ));
    }
    let updated = db::meetings::respond(&state.pool, id, req.status)
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record"))?;
    Ok(Json(updated))
}

// Reminders

pub async fn list_reminders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<MeetingReminder>>> {
    let page = page.request();
    let count = db::meetings::count_reminders(&state.pool, user.id).await?;
    let rows = db::meetings::list_reminders(&state.pool, user.id, page).await?;
    Ok(Json(Paginated::new(count, page, rows)))
}

pub async fn get_reminder(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MeetingReminder>> {
    let reminder = db::meetings::get_reminder(&state.pool, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting reminder"))?;
    Ok(Json(reminder))
}

// Templates

async fn template_page(
    state: &AppState,
    is_active: Option<bool>,
    page: PageParams,
) -> ApiResult<Paginated<MeetingTemplate>> {
    let page = page.request();
    let count = db::meetings::count_templates(&state.pool, is_active).await?;
    let rows = db::meetings::list_templates(&state.pool, is_active, page).await?;
    Ok(Paginated::new(count, page, rows))
}

async fn template(state: &AppState, id: i64) -> ApiResult<MeetingTemplate> {
    db::meetings::get_template(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting template"))
}

fn validate_template(input: &MeetingTemplateInput, creating: bool) -> ApiResult<()> {
    let blank_name = input.name.as_deref().map(|n| n.trim().is_empty());
    if blank_name == Some(true) || (creating && blank_name.is_none()) {
        return Err(ApiError::bad_request("Template name is required"));
    }
    if input.duration_minutes.is_some_and(|d| d <= 0) {
        return Err(ApiError::bad_request("duration_minutes must be positive"));
    }
    Ok(())
}

pub async fn list_templates(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(active): AppQuery<ActiveParam>,
) -> ApiResult<Json<Paginated<MeetingTemplate>>> {
    Ok(Json(template_page(&state, active.is_active, page).await?))
}

/// `GET /api/meeting-templates/active/`
pub async fn active_templates(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<MeetingTemplate>>> {
    Ok(Json(template_page(&state, Some(true), page).await?))
}

pub async fn get_template(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MeetingTemplate>> {
    Ok(Json(template(&state, id).await?))
}

pub async fn create_template(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(input): AppJson<MeetingTemplateInput>,
) -> ApiResult<(StatusCode, Json<MeetingTemplate>)> {
    let actor = user.require_agent()?;
    validate_template(&input, true)?;
    let template = db::meetings::create_template(&state.pool, &input, actor.id).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<MeetingTemplateInput>,
) -> ApiResult<Json<MeetingTemplate>> {
    user.require_agent()?;
    validate_template(&input, false)?;
    let template = db::meetings::update_template(&state.pool, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Meeting template"))?;
    Ok(Json(template))
}

pub async fn delete_template(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require_agent()?;
    if !db::meetings::delete_template(&state.pool, id).await? {
        return Err(ApiError::not_found("Meeting template"));
    }
    Ok(no_content())
}

#[derive(Debug, Deserialize)]
pub struct FromTemplateRequest {
    pub title: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub attendee_ids: Option<Vec<i64>>,
}

/// `POST /api/meeting-templates/{id}/create_meeting/`
pub async fn create_from_template(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    AppJson(req): AppJson<FromTemplateRequest>,
) -> ApiResult<(StatusCode, Json<MeetingView>)> {
    let template = template(&state, id).await?;
    let start = req
        .start_time
        .ok_or_else(|| ApiError::bad_request("start_time is required"))?;
    let (input, end) =
        db::meetings::meeting_from_template(&template, req.title, start, req.attendee_ids);
    MeetingInput::validate_window(start, end)?;

    let meeting = db::meetings::create_meeting(&state.pool, &input, user.id, start, end).await?;
    tracing::info!(meeting_id = meeting.id, template_id = id, "Meeting created from template");
    Ok((StatusCode::CREATED, Json(view(&state, meeting).await?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_is_hex_color() {
        assert!(is_hex_color("#3B82F6"));
        assert!(is_hex_color("#abcdef"));
        assert!(!is_hex_color("3B82F6"));
        assert!(!is_hex_color("#3B82F"));
        assert!(!is_hex_color("#GGGGGG"));
    }

    #[test]
    fn test_category_name_required_on_create_only() {
        let empty = MeetingCategoryInput::default();
        assert!(validate_category(&empty, true).is_err());
        assert!(validate_category(&empty, false).is_ok());
    }

    #[test]
    fn test_day_start() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap();
        assert_eq!(
            day_start(now),
            Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_search_request_maps_to_filter() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let filter = SearchRequest {
            title: Some("standup".into()),
            start_date: Some(start),
            ..Default::default()
        }
        .into_filter();
        assert_eq!(filter.search.as_deref(), Some("standup"));
        assert_eq!(filter.start_after, Some(start));
        assert!(filter.start_before.is_none());

        let blank = SearchRequest {
            title: Some("  ".into()),
            ..Default::default()
        }
        .into_filter();
        assert!(blank.search.is_none());
    }
}
