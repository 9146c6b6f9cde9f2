// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Report definitions and executions.

use sqlx::PgPool;

use super::{PageRequest, order_by, search_pattern};
use crate::models::{Report, ReportExecution, ReportFilter, ReportInput};

const REPORT_ORDERING: &[(&str, &str)] = &[
    ("created_at", "created_at"),
    ("last_generated", "last_generated"),
    ("name", "name"),
];

const REPORT_FILTER_SQL: &str = r#"
    ($1::TEXT IS NULL OR report_type = $1)
    AND ($2::BOOLEAN IS NULL OR is_active = $2)
    AND ($3::BIGINT IS NULL OR created_by_id = $3)
    AND ($4::TEXT IS NULL OR (name ILIKE $4 OR description ILIKE $4))
"#;

pub async fn create_report(
    pool: &PgPool,
    input: &ReportInput,
    created_by_id: i64,
) -> Result<Report, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        r#"
        INSERT INTO reports (
            name, description, report_type, format, parameters, schedule,
            created_by_id, is_active, is_automated
        ) VALUES (
            $1, COALESCE($2, ''), COALESCE($3, 'case_summary'), COALESCE($4, 'json'),
            COALESCE($5, '{}'::jsonb), COALESCE($6, ''), $7, COALESCE($8, TRUE),
            COALESCE($9, FALSE)
        )
        RETURNING *
        "#,
    )
    .bind(input.name.as_deref().unwrap_or_default())
    .bind(&input.description)
    .bind(input.report_type.map(|t| t.as_str()))
    .bind(input.format.map(|f| f.as_str()))
    .bind(&input.parameters)
    .bind(&input.schedule)
    .bind(created_by_id)
    .bind(input.is_active)
    .bind(input.is_automated)
    .fetch_one(pool)
    .await
}

pub async fn get_report(pool: &PgPool, id: i64) -> Result<Option<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_report(
    pool: &PgPool,
    id: i64,
    input: &ReportInput,
) -> Result<Option<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        r#"
        UPDATE reports SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            report_type = COALESCE($4, report_type),
            format = COALESCE($5, format),
            parameters = COALESCE($6, parameters),
            schedule = COALESCE($7, schedule),
            is_active = COALESCE($8, is_active),
            is_automated = COALESCE($9, is_automated),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.report_type.map(|t| t.as_str()))
    .bind(input.format.map(|f| f.as_str()))
    .bind(&input.parameters)
    .bind(&input.schedule)
    .bind(input.is_active)
    .bind(input.is_automated)
    .fetch_optional(pool)
    .await
}

pub async fn delete_report(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM reports WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_reports(
    pool: &PgPool,
    filter: &ReportFilter,
    page: PageRequest,
) -> Result<Vec<Report>, sqlx::Error> {
    let order = order_by(filter.ordering.as_deref(), REPORT_ORDERING, "created_at DESC");
    let query = format!(
        "SELECT * FROM reports WHERE {REPORT_FILTER_SQL} ORDER BY {order}, id DESC LIMIT $5 OFFSET $6"
    );
    sqlx::query_as::<_, Report>(&query)
        .bind(filter.report_type.map(|t| t.as_str()))
        .bind(filter.is_active)
        .bind(filter.created_by)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_reports(pool: &PgPool, filter: &ReportFilter) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) FROM reports WHERE {REPORT_FILTER_SQL}");
    let count: (i64,) = sqlx::query_as(&query)
        .bind(filter.report_type.map(|t| t.as_str()))
        .bind(filter.is_active)
        .bind(filter.created_by)
        .bind(search_pattern(filter.search.as_deref()))
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Active reports flagged for automatic generation.
pub async fn list_automated(pool: &PgPool) -> Result<Vec<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        "SELECT * FROM reports WHERE is_active AND is_automated ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn touch_last_generated(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE reports SET last_generated = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Open an execution in `running` state.
pub async fn start_execution(
    pool: &PgPool,
    report_id: i64,
) -> Result<ReportExecution, sqlx::Error> {
    sqlx::query_as::<_, ReportExecution>(
        "INSERT INTO report_executions (report_id, status) VALUES ($1, 'running') RETURNING *",
    )
    .bind(report_id)
    .fetch_one(pool)
    .await
}

pub async fn complete_execution(
    pool: &PgPool,
    id: i64,
    result_data: &serde_json::Value,
    file_size: i64,
) -> Result<ReportExecution, sqlx::Error> {
    sqlx::query_as::<_, ReportExecution>(
        r#"
        UPDATE report_executions SET
            status = 'completed',
            completed_at = NOW(),
            duration_secs = EXTRACT(EPOCH FROM NOW() - started_at)::DOUBLE PRECISION,
            result_data = $2,
            file_size = $3
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(result_data)
    .bind(file_size)
    .fetch_one(pool)
    .await
}

pub async fn fail_execution(
    pool: &PgPool,
    id: i64,
    error: &str,
) -> Result<ReportExecution, sqlx::Error> {
    sqlx::query_as::<_, ReportExecution>(
        r#"
        UPDATE report_executions SET
            status = 'failed',
            completed_at = NOW(),
            duration_secs = EXTRACT(EPOCH FROM NOW() - started_at)::DOUBLE PRECISION,
            error_message = $2
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(error)
    .fetch_one(pool)
    .await
}

pub async fn list_executions(
    pool: &PgPool,
    report_id: i64,
    page: PageRequest,
) -> Result<Vec<ReportExecution>, sqlx::Error> {
    sqlx::query_as::<_, ReportExecution>(
        r#"
        SELECT * FROM report_executions WHERE report_id = $1
        ORDER BY started_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(report_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await
}

pub async fn count_executions(pool: &PgPool, report_id: i64) -> Result<i64, sqlx::Error> {
    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM report_executions WHERE report_id = $1")
            .bind(report_id)
            .fetch_one(pool)
            .await?;
    Ok(count.0)
}

pub async fn latest_completed_execution(
    pool: &PgPool,
    report_id: i64,
) -> Result<Option<ReportExecution>, sqlx::Error> {
    sqlx::query_as::<_, ReportExecution>(
        r#"
        SELECT * FROM report_executions
        WHERE report_id = $1 AND status = 'completed'
        ORDER BY completed_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(report_id)
    .fetch_optional(pool)
    .await
}
