// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Meetings with their categories, attendance, reminders and templates.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::{LabelCount, PageRequest, order_by, priority_rank, search_pattern};
use crate::models::{
    AttendanceStatus, Meeting, MeetingAttendance, MeetingCategory, MeetingCategoryInput,
    MeetingFilter, MeetingInput, MeetingReminder, MeetingStatus, MeetingTemplate,
    MeetingTemplateInput, ReminderType,
};
use crate::permissions::MeetingScope;

const MEETING_ORDERING: &[(&str, &str)] = &[
    ("start_time", "m.start_time"),
    ("end_time", "m.end_time"),
    ("created_at", "m.created_at"),
    ("title", "m.title"),
    ("priority", priority_rank!("m.priority")),
];

const MEETING_FILTER_SQL: &str = r#"
    ($1::BIGINT IS NULL
        OR m.organizer_id = $1
        OR NOT m.is_private
        OR EXISTS (SELECT 1 FROM meeting_attendance a WHERE a.meeting_id = m.id AND a.user_id = $1))
    AND ($2::TEXT IS NULL OR m.meeting_type = $2)
    AND ($3::TEXT IS NULL OR m.status = $3)
    AND ($4::TEXT IS NULL OR m.priority = $4)
    AND ($5::BIGINT IS NULL OR m.category_id = $5)
    AND ($6::BIGINT IS NULL OR m.organizer_id = $6)
    AND ($7::BIGINT IS NULL OR m.case_id = $7)
    AND ($8::BIGINT IS NULL OR m.contact_id = $8)
    AND ($9::BIGINT IS NULL OR m.company_id = $9)
    AND ($10::BIGINT IS NULL
        OR EXISTS (
            SELECT 1 FROM meeting_attendance a
            WHERE a.meeting_id = m.id AND a.user_id = $10
        ))
    AND ($11::TIMESTAMPTZ IS NULL OR m.start_time >= $11)
    AND ($12::TIMESTAMPTZ IS NULL OR m.start_time < $12)
    AND ($13::TIMESTAMPTZ IS NULL OR m.end_time < $13)
    AND ($14::TEXT IS NULL OR (
        m.title ILIKE $14 OR m.description ILIKE $14 OR m.location ILIKE $14
        OR m.agenda ILIKE $14 OR m.notes ILIKE $14
    ))
"#;

macro_rules! bind_meeting_filter {
    ($query:expr, $filter:expr, $scope:expr) => {
        $query
            .bind($scope.user_id())
            .bind($filter.meeting_type.map(|t| t.as_str()))
            .bind($filter.status.map(|s| s.as_str()))
            .bind($filter.priority.map(|p| p.as_str()))
            .bind($filter.category)
            .bind($filter.organizer)
            .bind($filter.case)
            .bind($filter.contact)
            .bind($filter.company)
            .bind($filter.attendee)
            .bind($filter.start_after)
            .bind($filter.start_before)
            .bind($filter.end_before)
            .bind(search_pattern($filter.search.as_deref()))
    };
}

async fn invite_attendees(
    tx: &mut Transaction<'_, Postgres>,
    meeting_id: i64,
    user_ids: &[i64],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO meeting_attendance (meeting_id, user_id, status)
        SELECT $1, id, 'invited' FROM users WHERE id = ANY($2)
        ON CONFLICT (meeting_id, user_id) DO NOTHING
        "#,
    )
    .bind(meeting_id)
    .bind(user_ids)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Queue an email reminder for the organizer and every attendee.
async fn schedule_reminders(
    tx: &mut Transaction<'_, Postgres>,
    meeting: &Meeting,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO meeting_reminders (meeting_id, user_id, reminder_type, scheduled_for)
        SELECT $1, u.user_id, $3, $4
        FROM (
            SELECT $2::BIGINT AS user_id
            UNION
            SELECT user_id FROM meeting_attendance WHERE meeting_id = $1
        ) u
        "#,
    )
    .bind(meeting.id)
    .bind(meeting.organizer_id)
    .bind(ReminderType::Email.as_str())
    .bind(meeting.reminder_time())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Insert a meeting, invite `attendee_ids` and schedule reminders.
pub async fn create_meeting(
    pool: &PgPool,
    input: &MeetingInput,
    organizer_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<Meeting, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let meeting = sqlx::query_as::<_, Meeting>(
        r#"
        INSERT INTO meetings (
            title, description, meeting_type, status, priority, start_time, end_time,
            timezone, all_day, location, location_type, meeting_url, organizer_id,
            category_id, case_id, contact_id, company_id, is_recurring, recurrence_rule,
            parent_meeting_id, reminder_minutes, send_reminders, agenda, notes, is_private
        ) VALUES (
            $1, COALESCE($2, ''), COALESCE($3, 'internal'), COALESCE($4, 'scheduled'),
            COALESCE($5, 'medium'), $6, $7, COALESCE($8, 'UTC'), COALESCE($9, FALSE),
            COALESCE($10, ''), COALESCE($11, 'virtual'), COALESCE($12, ''), $13, $14,
            $15, $16, $17, COALESCE($18, FALSE), COALESCE($19, '{}'::jsonb), $20,
            COALESCE($21, 15), COALESCE($22, TRUE), COALESCE($23, ''), COALESCE($24, ''),
            COALESCE($25, FALSE)
        )
        RETURNING *
        "#,
    )
    .bind(input.title.as_deref().unwrap_or_default())
    .bind(&input.description)
    .bind(input.meeting_type.map(|t| t.as_str()))
    .bind(input.status.map(|s| s.as_str()))
    .bind(input.priority.map(|p| p.as_str()))
    .bind(start_time)
    .bind(end_time)
    .bind(&input.timezone)
    .bind(input.all_day)
    .bind(&input.location)
    .bind(input.location_type.map(|l| l.as_str()))
    .bind(&input.meeting_url)
    .bind(organizer_id)
    .bind(input.category_id.flatten())
    .bind(input.case_id.flatten())
    .bind(input.contact_id.flatten())
    .bind(input.company_id.flatten())
    .bind(input.is_recurring)
    .bind(&input.recurrence_rule)
    .bind(input.parent_meeting_id)
    .bind(input.reminder_minutes)
    .bind(input.send_reminders)
    .bind(&input.agenda)
    .bind(&input.notes)
    .bind(input.is_private)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(attendee_ids) = input.attendee_ids.as_deref().filter(|ids| !ids.is_empty()) {
        invite_attendees(&mut tx, meeting.id, attendee_ids).await?;
    }
    if meeting.send_reminders {
        schedule_reminders(&mut tx, &meeting).await?;
    }

    tx.commit().await?;
    Ok(meeting)
}

/// Partial update. When `attendee_ids` is present the attendee set is replaced.
pub async fn update_meeting(
    pool: &PgPool,
    id: i64,
    input: &MeetingInput,
) -> Result<Option<Meeting>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let meeting = sqlx::query_as::<_, Meeting>(
        r#"
        UPDATE meetings SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            meeting_type = COALESCE($4, meeting_type),
            status = COALESCE($5, status),
            priority = COALESCE($6, priority),
            start_time = COALESCE($7, start_time),
            end_time = COALESCE($8, end_time),
            timezone = COALESCE($9, timezone),
            all_day = COALESCE($10, all_day),
            location = COALESCE($11, location),
            location_type = COALESCE($12, location_type),
            meeting_url = COALESCE($13, meeting_url),
            category_id = CASE WHEN $27 THEN $14 ELSE category_id END,
            case_id = CASE WHEN $28 THEN $15 ELSE case_id END,
            contact_id = CASE WHEN $29 THEN $16 ELSE contact_id END,
            company_id = CASE WHEN $30 THEN $17 ELSE company_id END,
            is_recurring = COALESCE($18, is_recurring),
            recurrence_rule = COALESCE($19, recurrence_rule),
            reminder_minutes = COALESCE($20, reminder_minutes),
            send_reminders = COALESCE($21, send_reminders),
            agenda = COALESCE($22, agenda),
            notes = COALESCE($23, notes),
            outcome = COALESCE($24, outcome),
            is_active = COALESCE($25, is_active),
            is_private = COALESCE($26, is_private),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.meeting_type.map(|t| t.as_str()))
    .bind(input.status.map(|s| s.as_str()))
    .bind(input.priority.map(|p| p.as_str()))
    .bind(input.start_time)
    .bind(input.end_time)
    .bind(&input.timezone)
    .bind(input.all_day)
    .bind(&input.location)
    .bind(input.location_type.map(|l| l.as_str()))
    .bind(&input.meeting_url)
    .bind(input.category_id.flatten())
    .bind(input.case_id.flatten())
    .bind(input.contact_id.flatten())
    .bind(input.company_id.flatten())
    .bind(input.is_recurring)
    .bind(&input.recurrence_rule)
    .bind(input.reminder_minutes)
    .bind(input.send_reminders)
    .bind(&input.agenda)
    .bind(&input.notes)
    .bind(&input.outcome)
    .bind(input.is_active)
    .bind(input.is_private)
    .bind(input.category_id.is_some())
    .bind(input.case_id.is_some())
    .bind(input.contact_id.is_some())
    .bind(input.company_id.is_some())
    .fetch_optional(&mut *tx)
    .await?;

    if let (Some(meeting), Some(attendee_ids)) = (&meeting, &input.attendee_ids) {
        sqlx::query(
            "DELETE FROM meeting_attendance WHERE meeting_id = $1 AND NOT (user_id = ANY($2))",
        )
        .bind(meeting.id)
        .bind(attendee_ids)
        .execute(&mut *tx)
        .await?;
        invite_attendees(&mut tx, meeting.id, attendee_ids).await?;
    }

    if let Some(meeting) = &meeting {
        if input.touches_reminders() {
            reschedule_reminders(&mut tx, meeting).await?;
        }
    }

    tx.commit().await?;
    Ok(meeting)
}

/// Replace pending reminders after the schedule or the attendee set changed.
/// Reminders already sent are kept as history.
async fn reschedule_reminders(
    tx: &mut Transaction<'_, Postgres>,
    meeting: &Meeting,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM meeting_reminders WHERE meeting_id = $1 AND NOT is_sent")
        .bind(meeting.id)
        .execute(&mut **tx)
        .await?;
    if meeting.send_reminders {
        schedule_reminders(tx, meeting).await?;
    }
    Ok(())
}

pub async fn get_meeting(pool: &PgPool, id: i64) -> Result<Option<Meeting>, sqlx::Error> {
    sqlx::query_as::<_, Meeting>("SELECT * FROM meetings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_visible_meeting(
    pool: &PgPool,
    id: i64,
    scope: MeetingScope,
) -> Result<Option<Meeting>, sqlx::Error> {
    let filter = MeetingFilter::default();
    let query = format!("SELECT m.* FROM meetings m WHERE {MEETING_FILTER_SQL} AND m.id = $15");
    bind_meeting_filter!(sqlx::query_as::<_, Meeting>(&query), filter, scope)
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_meetings(
    pool: &PgPool,
    filter: &MeetingFilter,
    scope: MeetingScope,
    page: PageRequest,
) -> Result<Vec<Meeting>, sqlx::Error> {
    let order = order_by(filter.ordering.as_deref(), MEETING_ORDERING, "m.start_time DESC");
    let query = format!(
        "SELECT m.* FROM meetings m WHERE {MEETING_FILTER_SQL} ORDER BY {order}, m.id DESC LIMIT $15 OFFSET $16"
    );
    bind_meeting_filter!(sqlx::query_as::<_, Meeting>(&query), filter, scope)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_meetings(
    pool: &PgPool,
    filter: &MeetingFilter,
    scope: MeetingScope,
) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) FROM meetings m WHERE {MEETING_FILTER_SQL}");
    let count: (i64,) = bind_meeting_filter!(sqlx::query_as(&query), filter, scope)
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

pub async fn set_status(
    pool: &PgPool,
    id: i64,
    status: MeetingStatus,
    outcome: Option<&str>,
) -> Result<Option<Meeting>, sqlx::Error> {
    sqlx::query_as::<_, Meeting>(
        r#"
        UPDATE meetings SET status = $2, outcome = COALESCE($3, outcome), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(outcome)
    .fetch_optional(pool)
    .await
}

pub async fn delete_meeting(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM meetings WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Ids of the users invited to a meeting.
pub async fn attendee_ids(pool: &PgPool, meeting_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT user_id FROM meeting_attendance WHERE meeting_id = $1 ORDER BY user_id",
    )
    .bind(meeting_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MeetingStats {
    pub total: i64,
    pub today: i64,
    pub upcoming: i64,
    pub past: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub by_type: Vec<LabelCount>,
    pub by_status: Vec<LabelCount>,
}

pub async fn meeting_stats(
    pool: &PgPool,
    scope: MeetingScope,
    now: DateTime<Utc>,
) -> Result<MeetingStats, sqlx::Error> {
    let filter = MeetingFilter::default();
    let day_start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|d| d.and_utc())
        .unwrap_or(now);
    let day_end = day_start + Duration::days(1);

    let totals_sql = format!(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE m.start_time >= $15 AND m.start_time < $16),
               COUNT(*) FILTER (WHERE m.start_time > $17),
               COUNT(*) FILTER (WHERE m.end_time < $17),
               COUNT(*) FILTER (WHERE m.status = 'completed'),
               COUNT(*) FILTER (WHERE m.status = 'cancelled')
        FROM meetings m
        WHERE {MEETING_FILTER_SQL}
        "#
    );
    let totals: (i64, i64, i64, i64, i64, i64) =
        bind_meeting_filter!(sqlx::query_as(&totals_sql), filter, scope)
            .bind(day_start)
            .bind(day_end)
            .bind(now)
            .fetch_one(pool)
            .await?;

    let mut groups = Vec::with_capacity(2);
    for column in ["m.meeting_type", "m.status"] {
        let sql = format!(
            r#"
            SELECT {column} AS label, COUNT(*) AS count
            FROM meetings m
            WHERE {MEETING_FILTER_SQL}
            GROUP BY {column}
            ORDER BY count DESC, label
            "#
        );
        let rows = bind_meeting_filter!(sqlx::query_as::<_, LabelCount>(&sql), filter, scope)
            .fetch_all(pool)
            .await?;
        groups.push(rows);
    }
    let by_status = groups.pop().unwrap_or_default();
    let by_type = groups.pop().unwrap_or_default();

    Ok(MeetingStats {
        total: totals.0,
        today: totals.1,
        upcoming: totals.2,
        past: totals.3,
        completed: totals.4,
        cancelled: totals.5,
        by_type,
        by_status,
    })
}

// Attendance

pub async fn get_attendance(
    pool: &PgPool,
    meeting_id: i64,
    user_id: i64,
) -> Result<Option<MeetingAttendance>, sqlx::Error> {
    sqlx::query_as::<_, MeetingAttendance>(
        "SELECT * FROM meeting_attendance WHERE meeting_id = $1 AND user_id = $2",
    )
    .bind(meeting_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_attendance_by_id(
    pool: &PgPool,
    id: i64,
) -> Result<Option<MeetingAttendance>, sqlx::Error> {
    sqlx::query_as::<_, MeetingAttendance>("SELECT * FROM meeting_attendance WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Mark the user as attended, stamping `joined_at`.
pub async fn mark_joined(
    pool: &PgPool,
    meeting_id: i64,
    user_id: i64,
) -> Result<Option<MeetingAttendance>, sqlx::Error> {
    sqlx::query_as::<_, MeetingAttendance>(
        r#"
        UPDATE meeting_attendance
        SET status = 'attended', joined_at = NOW(), updated_at = NOW()
        WHERE meeting_id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(meeting_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn mark_left(
    pool: &PgPool,
    meeting_id: i64,
    user_id: i64,
) -> Result<Option<MeetingAttendance>, sqlx::Error> {
    sqlx::query_as::<_, MeetingAttendance>(
        r#"
        UPDATE meeting_attendance SET left_at = NOW(), updated_at = NOW()
        WHERE meeting_id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(meeting_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Record an RSVP.
pub async fn respond(
    pool: &PgPool,
    id: i64,
    status: AttendanceStatus,
) -> Result<Option<MeetingAttendance>, sqlx::Error> {
    sqlx::query_as::<_, MeetingAttendance>(
        r#"
        UPDATE meeting_attendance SET status = $2, response_time = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await
}

/// Attendance rows; `user_id` restricts to one user.
pub async fn list_attendance(
    pool: &PgPool,
    user_id: Option<i64>,
    meeting_id: Option<i64>,
    page: PageRequest,
) -> Result<Vec<MeetingAttendance>, sqlx::Error> {
    sqlx::query_as::<_, MeetingAttendance>(
        r#"
        SELECT * FROM meeting_attendance
        WHERE ($1::BIGINT IS NULL OR user_id = $1) AND ($2::BIGINT IS NULL OR meeting_id = $2)
        ORDER BY created_at DESC, id DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(meeting_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await
}

pub async fn count_attendance(
    pool: &PgPool,
    user_id: Option<i64>,
    meeting_id: Option<i64>,
) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM meeting_attendance
        WHERE ($1::BIGINT IS NULL OR user_id = $1) AND ($2::BIGINT IS NULL OR meeting_id = $2)
        "#,
    )
    .bind(user_id)
    .bind(meeting_id)
    .fetch_one(pool)
    .await?;
    Ok(count.0)
}

// Reminders

pub async fn list_reminders(
    pool: &PgPool,
    user_id: i64,
    page: PageRequest,
) -> Result<Vec<MeetingReminder>, sqlx::Error> {
    sqlx::query_as::<_, MeetingReminder>(
        r#"
        SELECT * FROM meeting_reminders WHERE user_id = $1
        ORDER BY scheduled_for DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await
}

pub async fn count_reminders(pool: &PgPool, user_id: i64) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM meeting_reminders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

pub async fn get_reminder(
    pool: &PgPool,
    id: i64,
    user_id: i64,
) -> Result<Option<MeetingReminder>, sqlx::Error> {
    sqlx::query_as::<_, MeetingReminder>(
        "SELECT * FROM meeting_reminders WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Unsent reminders due at `now`, skipping cancelled or inactive meetings.
pub async fn list_due_reminders(
    pool: &PgPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<MeetingReminder>, sqlx::Error> {
    sqlx::query_as::<_, MeetingReminder>(
        r#"
        SELECT r.* FROM meeting_reminders r
        JOIN meetings m ON m.id = r.meeting_id
        WHERE NOT r.is_sent AND r.scheduled_for <= $1
          AND m.is_active AND m.status NOT IN ('cancelled', 'completed')
        ORDER BY r.scheduled_for ASC, r.id ASC
        LIMIT $2
        "#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn mark_reminder_sent(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE meeting_reminders SET is_sent = TRUE, sent_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// Categories

pub async fn create_category(
    pool: &PgPool,
    input: &MeetingCategoryInput,
    created_by_id: i64,
) -> Result<MeetingCategory, sqlx::Error> {
    sqlx::query_as::<_, MeetingCategory>(
        r#"
        INSERT INTO meeting_categories (name, color, description, is_active, created_by_id)
        VALUES ($1, COALESCE($2, '#3B82F6'), COALESCE($3, ''), COALESCE($4, TRUE), $5)
        RETURNING *
        "#,
    )
    .bind(input.name.as_deref().unwrap_or_default())
    .bind(&input.color)
    .bind(&input.description)
    .bind(input.is_active)
    .bind(created_by_id)
    .fetch_one(pool)
    .await
}

pub async fn get_category(pool: &PgPool, id: i64) -> Result<Option<MeetingCategory>, sqlx::Error> {
    sqlx::query_as::<_, MeetingCategory>("SELECT * FROM meeting_categories WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_category(
    pool: &PgPool,
    id: i64,
    input: &MeetingCategoryInput,
) -> Result<Option<MeetingCategory>, sqlx::Error> {
    sqlx::query_as::<_, MeetingCategory>(
        r#"
        UPDATE meeting_categories SET
            name = COALESCE($2, name),
            color = COALESCE($3, color),
            description = COALESCE($4, description),
            is_active = COALESCE($5, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.name)
    .bind(&input.color)
    .bind(&input.description)
    .bind(input.is_active)
    .fetch_optional(pool)
    .await
}

pub async fn delete_category(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM meeting_categories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_categories(
    pool: &PgPool,
    is_active: Option<bool>,
    page: PageRequest,
) -> Result<Vec<MeetingCategory>, sqlx::Error> {
    sqlx::query_as::<_, MeetingCategory>(
        r#"
        SELECT * FROM meeting_categories
        WHERE ($1::BOOLEAN IS NULL OR is_active = $1)
        ORDER BY name ASC, id ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(is_active)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await
}

pub async fn count_categories(pool: &PgPool, is_active: Option<bool>) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM meeting_categories WHERE ($1::BOOLEAN IS NULL OR is_active = $1)",
    )
    .bind(is_active)
    .fetch_one(pool)
    .await?;
    Ok(count.0)
}

// Templates

pub async fn create_template(
    pool: &PgPool,
    input: &MeetingTemplateInput,
    created_by_id: i64,
) -> Result<MeetingTemplate, sqlx::Error> {
    sqlx::query_as::<_, MeetingTemplate>(
        r#"
        INSERT INTO meeting_templates (
            name, description, meeting_type, duration_minutes, default_agenda,
            default_location, default_location_type, category_id, is_active, created_by_id
        ) VALUES (
            $1, COALESCE($2, ''), COALESCE($3, 'internal'), COALESCE($4, 60),
            COALESCE($5, ''), COALESCE($6, ''), COALESCE($7, 'virtual'), $8,
            COALESCE($9, TRUE), $10
        )
        RETURNING *
        "#,
    )
    .bind(input.name.as_deref().unwrap_or_default())
    .bind(&input.description)
    .bind(input.meeting_type.map(|t| t.as_str()))
    .bind(input.duration_minutes)
    .bind(&input.default_agenda)
    .bind(&input.default_location)
    .bind(input.default_location_type.map(|l| l.as_str()))
    .bind(input.category_id)
    .bind(input.is_active)
    .bind(created_by_id)
    .fetch_one(pool)
    .await
}

pub async fn get_template(pool: &PgPool, id: i64) -> Result<Option<MeetingTemplate>, sqlx::Error> {
    sqlx::query_as::<_, MeetingTemplate>("SELECT * FROM meeting_templates WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_template(
    pool: &PgPool,
    id: i64,
    input: &MeetingTemplateInput,
) -> Result<Option<MeetingTemplate>, sqlx::Error> {
    sqlx::query_as::<_, MeetingTemplate>(
        r#"
        UPDATE meeting_templates SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            meeting_type = COALESCE($4, meeting_type),
            duration_minutes = COALESCE($5, duration_minutes),
            default_agenda = COALESCE($6, default_agenda),
            default_location = COALESCE($7, default_location),
            default_location_type = COALESCE($8, default_location_type),
            category_id = COALESCE($9, category_id),
            is_active = COALESCE($10, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.meeting_type.map(|t| t.as_str()))
    .bind(input.duration_minutes)
    .bind(&input.default_agenda)
    .bind(&input.default_location)
    .bind(input.default_location_type.map(|l| l.as_str()))
    .bind(input.category_id)
    .bind(input.is_active)
    .fetch_optional(pool)
    .await
}

pub async fn delete_template(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM meeting_templates WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_templates(
    pool: &PgPool,
    is_active: Option<bool>,
    page: PageRequest,
) -> Result<Vec<MeetingTemplate>, sqlx::Error> {
    sqlx::query_as::<_, MeetingTemplate>(
        r#"
        SELECT * FROM meeting_templates
        WHERE ($1::BOOLEAN IS NULL OR is_active = $1)
        ORDER BY name ASC, id ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(is_active)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await
}

pub async fn count_templates(pool: &PgPool, is_active: Option<bool>) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM meeting_templates WHERE ($1::BOOLEAN IS NULL OR is_active = $1)",
    )
    .bind(is_active)
    .fetch_one(pool)
    .await?;
    Ok(count.0)
}

/// Meeting fields derived from a template, for `create_meeting`.
pub fn meeting_from_template(
    template: &MeetingTemplate,
    title: Option<String>,
    start_time: DateTime<Utc>,
    attendee_ids: Option<Vec<i64>>,
) -> (MeetingInput, DateTime<Utc>) {
    let end_time = start_time + Duration::minutes(i64::from(template.duration_minutes));
    let input = MeetingInput {
        title: Some(title.unwrap_or_else(|| template.name.clone())),
        description: Some(template.description.clone()),
        meeting_type: Some(template.meeting_type),
        agenda: Some(template.default_agenda.clone()),
        location: Some(template.default_location.clone()),
        location_type: Some(template.default_location_type),
        category_id: Some(template.category_id),
        start_time: Some(start_time),
        end_time: Some(end_time),
        attendee_ids,
        ..Default::default()
    };
    (input, end_time)
}
