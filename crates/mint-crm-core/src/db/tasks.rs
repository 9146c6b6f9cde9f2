// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tasks.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use super::{PageRequest, order_by, priority_rank, search_pattern};
use crate::models::{Task, TaskFilter, TaskInput};

const TASK_ORDERING: &[(&str, &str)] = &[
    ("created_at", "created_at"),
    ("due_date", "due_date"),
    ("priority", priority_rank!("priority")),
];

const DEFAULT_TASK_ORDER: &str = concat!(priority_rank!("priority"), " DESC, created_at DESC");

// $6 restricts to overdue tasks as of that instant.
const TASK_FILTER_SQL: &str = r#"
    ($1::TEXT IS NULL OR status = $1)
    AND ($2::TEXT IS NULL OR priority = $2)
    AND ($3::BIGINT IS NULL OR assigned_to_id = $3)
    AND ($4::BIGINT IS NULL OR case_id = $4)
    AND ($5::TEXT IS NULL OR (title ILIKE $5 OR description ILIKE $5))
    AND ($6::TIMESTAMPTZ IS NULL OR (
        due_date < $6 AND status NOT IN ('completed', 'cancelled')
    ))
"#;

pub async fn create_task(
    pool: &PgPool,
    input: &TaskInput,
    created_by_id: i64,
) -> Result<Task, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks (
            title, description, priority, status, assigned_to_id, created_by_id,
            case_id, due_date, completed_at, tags, notes
        ) VALUES (
            $1, COALESCE($2, ''), COALESCE($3, 'medium'), COALESCE($4, 'pending'), $5, $6,
            $7, $8, CASE WHEN $4 = 'completed' THEN NOW() END,
            COALESCE($9, '[]'::jsonb), COALESCE($10, '')
        )
        RETURNING *
        "#,
    )
    .bind(input.title.as_deref().unwrap_or_default())
    .bind(&input.description)
    .bind(input.priority.map(|p| p.as_str()))
    .bind(input.status.map(|s| s.as_str()))
    .bind(input.assigned_to_id.flatten())
    .bind(created_by_id)
    .bind(input.case_id.flatten())
    .bind(input.due_date.flatten())
    .bind(input.tags.as_ref().map(Json))
    .bind(&input.notes)
    .fetch_one(pool)
    .await
}

pub async fn get_task(pool: &PgPool, id: i64) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Partial update. `completed_at` follows the status: stamped on the move to
/// `completed`, cleared on any other status.
pub async fn update_task(
    pool: &PgPool,
    id: i64,
    input: &TaskInput,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            priority = COALESCE($4, priority),
            status = COALESCE($5, status),
            assigned_to_id = CASE WHEN $11 THEN $6 ELSE assigned_to_id END,
            case_id = CASE WHEN $12 THEN $7 ELSE case_id END,
            due_date = CASE WHEN $13 THEN $8 ELSE due_date END,
            tags = COALESCE($9, tags),
            notes = COALESCE($10, notes),
            completed_at = CASE
                WHEN $5 IS NULL THEN completed_at
                WHEN $5 = 'completed' THEN COALESCE(completed_at, NOW())
                ELSE NULL
            END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.priority.map(|p| p.as_str()))
    .bind(input.status.map(|s| s.as_str()))
    .bind(input.assigned_to_id.flatten())
    .bind(input.case_id.flatten())
    .bind(input.due_date.flatten())
    .bind(input.tags.as_ref().map(Json))
    .bind(&input.notes)
    .bind(input.assigned_to_id.is_some())
    .bind(input.case_id.is_some())
    .bind(input.due_date.is_some())
    .fetch_optional(pool)
    .await
}

pub async fn delete_task(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Tasks matching `filter`; with `overdue_at` only those overdue at that time.
pub async fn list_tasks(
    pool: &PgPool,
    filter: &TaskFilter,
    overdue_at: Option<DateTime<Utc>>,
    page: PageRequest,
) -> Result<Vec<Task>, sqlx::Error> {
    let order = order_by(filter.ordering.as_deref(), TASK_ORDERING, DEFAULT_TASK_ORDER);
    let query = format!(
        "SELECT * FROM tasks WHERE {TASK_FILTER_SQL} ORDER BY {order}, id DESC LIMIT $7 OFFSET $8"
    );
    sqlx::query_as::<_, Task>(&query)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.priority.map(|p| p.as_str()))
        .bind(filter.assigned_to)
        .bind(filter.case)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(overdue_at)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_tasks(
    pool: &PgPool,
    filter: &TaskFilter,
    overdue_at: Option<DateTime<Utc>>,
) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) FROM tasks WHERE {TASK_FILTER_SQL}");
    let count: (i64,) = sqlx::query_as(&query)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.priority.map(|p| p.as_str()))
        .bind(filter.assigned_to)
        .bind(filter.case)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(overdue_at)
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}
