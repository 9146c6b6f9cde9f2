// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cases.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};

use super::{LabelCount, PageRequest, order_by, priority_rank, search_pattern};
use crate::models::{Case, CaseFilter, CaseListItem, CasePatch, CaseStatus, NewCase, Priority};
use crate::permissions::CaseScope;
use crate::services::case_numbers::{ALLOCATION_LOCK_KEY, next_case_number};

const CASE_ORDERING: &[(&str, &str)] = &[
    ("created_at", "c.created_at"),
    ("updated_at", "c.updated_at"),
    ("due_date", "c.due_date"),
    ("priority", priority_rank!("c.priority")),
    ("status", "c.status"),
    ("case_number", "c.case_number"),
];

const DEFAULT_CASE_ORDER: &str = concat!(priority_rank!("c.priority"), " DESC, c.created_at DESC");

const CASE_SELECT_SQL: &str = r#"
    SELECT c.*,
           TRIM(cu.first_name || ' ' || cu.last_name) AS customer_name,
           cu.email AS customer_email,
           co.name AS company_name,
           COALESCE(NULLIF(TRIM(au.first_name || ' ' || au.last_name), ''), au.email)
               AS assigned_to_name,
           (SELECT COUNT(*) FROM case_responses r WHERE r.case_id = c.id) AS response_count
    FROM cases c
    JOIN contacts cu ON cu.id = c.customer_id
    LEFT JOIN companies co ON co.id = c.company_id
    LEFT JOIN users au ON au.id = c.assigned_to_id
"#;

const CASE_FROM_SQL: &str = r#"
    FROM cases c
    JOIN contacts cu ON cu.id = c.customer_id
    LEFT JOIN companies co ON co.id = c.company_id
    LEFT JOIN users au ON au.id = c.assigned_to_id
"#;

const CASE_FILTER_SQL: &str = r#"
    ($1::TEXT IS NULL OR c.status = $1)
    AND ($2::TEXT IS NULL OR c.priority = $2)
    AND ($3::TEXT IS NULL OR c.category = $3)
    AND ($4::TEXT IS NULL OR c.source = $4)
    AND ($5::BIGINT IS NULL OR c.assigned_to_id = $5)
    AND ($6::BIGINT IS NULL OR c.customer_id = $6)
    AND ($7::BIGINT IS NULL OR c.company_id = $7)
    AND ($8::BIGINT IS NULL OR c.created_by_id = $8)
    AND ($9::TEXT IS NULL OR (
        c.case_number ILIKE $9 OR c.title ILIKE $9 OR c.description ILIKE $9
        OR cu.first_name ILIKE $9 OR cu.last_name ILIKE $9 OR cu.email ILIKE $9
        OR co.name ILIKE $9
        OR au.first_name ILIKE $9 OR au.last_name ILIKE $9 OR au.email ILIKE $9
    ))
    AND ($10::TEXT = 'all'
        OR ($10::TEXT = 'agent' AND (c.assigned_to_id = $11 OR c.assigned_to_id IS NULL))
        OR ($10::TEXT = 'customer' AND cu.user_id = $11))
    AND ($12::TIMESTAMPTZ IS NULL OR c.created_at >= $12)
    AND ($13::BOOLEAN IS NOT TRUE OR (
        c.priority IN ('urgent', 'high') AND c.status IN ('new', 'assigned', 'in_progress')
    ))
"#;

/// Extra narrowing used by dashboard-style actions on top of a [`CaseFilter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseQueryExtras {
    /// Only cases created at or after this instant.
    pub created_after: Option<DateTime<Utc>>,
    /// Only open high/urgent cases.
    pub urgent_only: bool,
}

fn bind_case_filter<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    filter: &'q CaseFilter,
    scope: CaseScope,
    extras: CaseQueryExtras,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    query
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.priority.map(|p| p.as_str()))
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.source.map(|s| s.as_str()))
        .bind(filter.assigned_to)
        .bind(filter.customer)
        .bind(filter.company)
        .bind(filter.created_by)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(scope.mode())
        .bind(scope.user_id())
        .bind(extras.created_after)
        .bind(extras.urgent_only)
}

/// Insert a case, allocating the next case number.
///
/// Allocation runs under a transaction-scoped advisory lock so concurrent
/// inserts never race for the same number.
pub async fn create_case(
    pool: &PgPool,
    input: &NewCase,
    created_by_id: i64,
) -> Result<Case, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(ALLOCATION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    let highest: (Option<i64>,) = sqlx::query_as(
        r#"
        SELECT MAX(substring(case_number FROM '([0-9]+)$')::BIGINT)
        FROM cases
        WHERE case_number ~ '^CASE-[0-9]+$'
        "#,
    )
    .fetch_one(&mut *tx)
    .await?;

    let case_number = next_case_number(highest.0);

    let status = if input.assigned_to_id.is_some() {
        CaseStatus::Assigned
    } else {
        CaseStatus::New
    };

    let case = sqlx::query_as::<_, Case>(
        r#"
        INSERT INTO cases (
            case_number, title, description, category, priority, status, source,
            customer_id, company_id, assigned_to_id, created_by_id, due_date,
            sla_hours, tags, email_thread_id
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8,
            COALESCE($9, (SELECT company_id FROM contacts WHERE id = $8)),
            $10, $11, $12, COALESCE($13, 24), $14, $15
        )
        RETURNING *
        "#,
    )
    .bind(&case_number)
    .bind(input.title.trim())
    .bind(&input.description)
    .bind(input.category.as_str())
    .bind(input.priority.as_str())
    .bind(status.as_str())
    .bind(input.source.as_str())
    .bind(input.customer_id)
    .bind(input.company_id)
    .bind(input.assigned_to_id)
    .bind(created_by_id)
    .bind(input.due_date)
    .bind(input.sla_hours)
    .bind(Json(&input.tags))
    .bind(&input.email_thread_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(case_id = case.id, case_number = %case.case_number, "Created case");

    Ok(case)
}

pub async fn get_case(pool: &PgPool, id: i64) -> Result<Option<Case>, sqlx::Error> {
    sqlx::query_as::<_, Case>("SELECT * FROM cases WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Cases opened at or after `since`, oldest first.
pub async fn list_created_since(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<Case>, sqlx::Error> {
    sqlx::query_as::<_, Case>("SELECT * FROM cases WHERE created_at >= $1 ORDER BY created_at, id")
        .bind(since)
        .fetch_all(pool)
        .await
}

/// A case as seen by `scope`; `None` when missing or not visible.
pub async fn get_visible_case(
    pool: &PgPool,
    id: i64,
    scope: CaseScope,
) -> Result<Option<CaseListItem>, sqlx::Error> {
    let filter = CaseFilter::default();
    let query = format!("{CASE_SELECT_SQL} WHERE {CASE_FILTER_SQL} AND c.id = $14");
    bind_case_filter(
        sqlx::query_as::<_, CaseListItem>(&query),
        &filter,
        scope,
        CaseQueryExtras::default(),
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_cases(
    pool: &PgPool,
    filter: &CaseFilter,
    scope: CaseScope,
    extras: CaseQueryExtras,
    page: PageRequest,
) -> Result<Vec<CaseListItem>, sqlx::Error> {
    let order = order_by(filter.ordering.as_deref(), CASE_ORDERING, DEFAULT_CASE_ORDER);
    let query = format!(
        "{CASE_SELECT_SQL} WHERE {CASE_FILTER_SQL} ORDER BY {order}, c.id DESC LIMIT $14 OFFSET $15"
    );
    bind_case_filter(sqlx::query_as::<_, CaseListItem>(&query), filter, scope, extras)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_cases(
    pool: &PgPool,
    filter: &CaseFilter,
    scope: CaseScope,
    extras: CaseQueryExtras,
) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) {CASE_FROM_SQL} WHERE {CASE_FILTER_SQL}");
    let count: (i64,) = bind_case_filter(sqlx::query_as(&query), filter, scope, extras)
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Apply a partial update.
///
/// Moving to `resolved` stamps `resolved_at` and `resolution_secs` the first
/// time it happens.
pub async fn update_case(
    pool: &PgPool,
    id: i64,
    patch: &CasePatch,
) -> Result<Option<Case>, sqlx::Error> {
    sqlx::query_as::<_, Case>(
        r#"
        UPDATE cases SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            category = COALESCE($4, category),
            priority = COALESCE($5, priority),
            status = COALESCE($6, status),
            source = COALESCE($7, source),
            customer_id = COALESCE($8, customer_id),
            company_id = CASE WHEN $14 THEN $9 ELSE company_id END,
            assigned_to_id = CASE WHEN $15 THEN $10 ELSE assigned_to_id END,
            due_date = CASE WHEN $16 THEN $11 ELSE due_date END,
            sla_hours = COALESCE($12, sla_hours),
            tags = COALESCE($13, tags),
            resolved_at = CASE
                WHEN $6 = 'resolved' AND resolved_at IS NULL THEN NOW()
                ELSE resolved_at
            END,
            resolution_secs = CASE
                WHEN $6 = 'resolved' AND resolved_at IS NULL
                    THEN EXTRACT(EPOCH FROM NOW() - created_at)::BIGINT
                ELSE resolution_secs
            END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&patch.title)
    .bind(&patch.description)
    .bind(patch.category.map(|c| c.as_str()))
    .bind(patch.priority.map(|p| p.as_str()))
    .bind(patch.status.map(|s| s.as_str()))
    .bind(patch.source.map(|s| s.as_str()))
    .bind(patch.customer_id)
    .bind(patch.company_id.flatten())
    .bind(patch.assigned_to_id.flatten())
    .bind(patch.due_date.flatten())
    .bind(patch.sla_hours)
    .bind(patch.tags.as_ref().map(Json))
    .bind(patch.company_id.is_some())
    .bind(patch.assigned_to_id.is_some())
    .bind(patch.due_date.is_some())
    .fetch_optional(pool)
    .await
}

pub async fn set_status(
    pool: &PgPool,
    id: i64,
    status: CaseStatus,
) -> Result<Option<Case>, sqlx::Error> {
    update_case(
        pool,
        id,
        &CasePatch {
            status: Some(status),
            ..Default::default()
        },
    )
    .await
}

pub async fn set_priority(
    pool: &PgPool,
    id: i64,
    priority: Priority,
) -> Result<Option<Case>, sqlx::Error> {
    update_case(
        pool,
        id,
        &CasePatch {
            priority: Some(priority),
            ..Default::default()
        },
    )
    .await
}

/// Assign the case and move it to `status` in one statement.
pub async fn assign(
    pool: &PgPool,
    id: i64,
    user_id: i64,
    status: CaseStatus,
    priority: Option<Priority>,
) -> Result<Option<Case>, sqlx::Error> {
    sqlx::query_as::<_, Case>(
        r#"
        UPDATE cases SET
            assigned_to_id = $2,
            status = $3,
            priority = COALESCE($4, priority),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(status.as_str())
    .bind(priority.map(|p| p.as_str()))
    .fetch_optional(pool)
    .await
}

pub async fn touch(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE cases SET updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_last_email_sent(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE cases SET last_email_sent = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Recompute first response and resolution times from the stored history.
///
/// The first response is the earliest internal note or email response.
pub async fn refresh_sla_metrics(pool: &PgPool, id: i64) -> Result<Option<Case>, sqlx::Error> {
    sqlx::query_as::<_, Case>(
        r#"
        UPDATE cases c SET
            first_response_secs = (
                SELECT EXTRACT(EPOCH FROM MIN(r.created_at) - c.created_at)::BIGINT
                FROM case_responses r
                WHERE r.case_id = c.id AND r.response_type IN ('internal', 'email')
            ),
            resolution_secs = CASE
                WHEN c.resolved_at IS NOT NULL
                    THEN EXTRACT(EPOCH FROM c.resolved_at - c.created_at)::BIGINT
            END
        WHERE c.id = $1
        RETURNING c.*
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_case(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cases WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Open medium/high cases past their due date, oldest deadline first.
pub async fn list_escalation_candidates(
    pool: &PgPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Case>, sqlx::Error> {
    sqlx::query_as::<_, Case>(
        r#"
        SELECT * FROM cases
        WHERE due_date < $1
          AND status IN ('new', 'assigned', 'in_progress')
          AND priority IN ('medium', 'high')
        ORDER BY due_date ASC, id ASC
        LIMIT $2
        "#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Sweep result applied to a single case: the bumped priority, the
/// `escalated` status and a system note by `author_id`, in one transaction.
/// Returns `None` when the case left the open statuses in the meantime.
pub async fn mark_escalated(
    pool: &PgPool,
    id: i64,
    priority: Priority,
    author_id: i64,
    note: &str,
) -> Result<Option<Case>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let case = sqlx::query_as::<_, Case>(
        r#"
        UPDATE cases SET priority = $2, status = 'escalated', updated_at = NOW()
        WHERE id = $1 AND status IN ('new', 'assigned', 'in_progress')
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(priority.as_str())
    .fetch_optional(&mut *tx)
    .await?;

    let Some(case) = case else {
        return Ok(None);
    };

    sqlx::query(
        r#"
        INSERT INTO case_responses (case_id, author_id, response_type, content, is_internal)
        VALUES ($1, $2, 'system', $3, TRUE)
        "#,
    )
    .bind(id)
    .bind(author_id)
    .bind(note)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(case))
}

/// Renumber every case by id order. Returns the number of cases touched.
pub async fn renumber_all(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(ALLOCATION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    // Move everything out of the way first so the unique index never sees a clash.
    sqlx::query("UPDATE cases SET case_number = 'TMP-' || id")
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query(
        r#"
        UPDATE cases c SET case_number = 'CASE-' || CASE
                WHEN n.seq < 1000000 THEN lpad(n.seq::TEXT, 6, '0')
                ELSE n.seq::TEXT
            END
        FROM (SELECT id, ROW_NUMBER() OVER (ORDER BY id) AS seq FROM cases) n
        WHERE c.id = n.id
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(result.rows_affected())
}

/// Counters for the case dashboard.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CaseDashboard {
    pub total_cases: i64,
    pub new_cases: i64,
    pub in_progress_cases: i64,
    pub resolved_cases: i64,
    pub overdue_cases: i64,
    pub by_priority: Vec<LabelCount>,
    pub by_status: Vec<LabelCount>,
    pub by_category: Vec<LabelCount>,
}

pub async fn dashboard_stats(
    pool: &PgPool,
    scope: CaseScope,
    since: DateTime<Utc>,
) -> Result<CaseDashboard, sqlx::Error> {
    let filter = CaseFilter::default();
    let extras = CaseQueryExtras {
        created_after: Some(since),
        urgent_only: false,
    };

    let totals_sql = format!(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE c.status = 'new'),
               COUNT(*) FILTER (WHERE c.status = 'in_progress'),
               COUNT(*) FILTER (WHERE c.status = 'resolved'),
               COUNT(*) FILTER (
                   WHERE c.due_date < NOW() AND c.status NOT IN ('resolved', 'closed')
               )
        {CASE_FROM_SQL}
        WHERE {CASE_FILTER_SQL}
        "#
    );
    let totals: (i64, i64, i64, i64, i64) =
        bind_case_filter(sqlx::query_as(&totals_sql), &filter, scope, extras)
            .fetch_one(pool)
            .await?;

    let mut groups = Vec::with_capacity(3);
    for column in ["c.priority", "c.status", "c.category"] {
        let sql = format!(
            r#"
            SELECT {column} AS label, COUNT(*) AS count
            {CASE_FROM_SQL}
            WHERE {CASE_FILTER_SQL}
            GROUP BY {column}
            ORDER BY count DESC, label
            "#
        );
        let rows = bind_case_filter(sqlx::query_as::<_, LabelCount>(&sql), &filter, scope, extras)
            .fetch_all(pool)
            .await?;
        groups.push(rows);
    }

    let by_category = groups.pop().unwrap_or_default();
    let by_status = groups.pop().unwrap_or_default();
    let by_priority = groups.pop().unwrap_or_default();

    Ok(CaseDashboard {
        total_cases: totals.0,
        new_cases: totals.1,
        in_progress_cases: totals.2,
        resolved_cases: totals.3,
        overdue_cases: totals.4,
        by_priority,
        by_status,
        by_category,
    })
}
