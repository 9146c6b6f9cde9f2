// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Responses posted on cases.

use sqlx::PgPool;

use super::{PageRequest, order_by};
use crate::models::{
    CaseResponse, CaseResponseFilter, CaseResponseItem, CaseResponsePatch, NewCaseResponse,
    ResponseType,
};
use crate::permissions::CaseScope;

const RESPONSE_ORDERING: &[(&str, &str)] = &[
    ("created_at", "r.created_at"),
    ("updated_at", "r.updated_at"),
];

const RESPONSE_SELECT_SQL: &str = r#"
    SELECT r.*,
           COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.email) AS author_name
    FROM case_responses r
    JOIN users u ON u.id = r.author_id
    JOIN cases c ON c.id = r.case_id
    JOIN contacts cu ON cu.id = c.customer_id
"#;

const RESPONSE_FROM_SQL: &str = r#"
    FROM case_responses r
    JOIN cases c ON c.id = r.case_id
    JOIN contacts cu ON cu.id = c.customer_id
"#;

// Customers never see internal notes.
const RESPONSE_FILTER_SQL: &str = r#"
    ($1::BIGINT IS NULL OR r.case_id = $1)
    AND ($2::TEXT IS NULL OR r.response_type = $2)
    AND ($3::BOOLEAN IS NULL OR r.is_internal = $3)
    AND ($4::BIGINT IS NULL OR r.author_id = $4)
    AND ($5::TEXT = 'all'
        OR ($5::TEXT = 'agent' AND (c.assigned_to_id = $6 OR c.assigned_to_id IS NULL))
        OR ($5::TEXT = 'customer' AND cu.user_id = $6 AND NOT r.is_internal))
"#;

/// Insert a response and bump the parent case's `updated_at`. The first
/// internal or email response also stamps the case's first response time.
///
/// `is_internal` defaults to true; customer-facing responses must opt out.
pub async fn create_response(
    pool: &PgPool,
    input: &NewCaseResponse,
    author_id: i64,
) -> Result<CaseResponse, sqlx::Error> {
    let is_internal = input.is_internal.unwrap_or(true);

    let mut tx = pool.begin().await?;

    let response = sqlx::query_as::<_, CaseResponse>(
        r#"
        INSERT INTO case_responses (
            case_id, author_id, response_type, content, is_internal,
            email_subject, email_from, email_to, email_cc
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(input.case_id)
    .bind(author_id)
    .bind(input.response_type.as_str())
    .bind(&input.content)
    .bind(is_internal)
    .bind(&input.email_subject)
    .bind(&input.email_from)
    .bind(&input.email_to)
    .bind(&input.email_cc)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE cases SET
            updated_at = NOW(),
            first_response_secs = CASE
                WHEN first_response_secs IS NULL AND $2 IN ('internal', 'email')
                    THEN EXTRACT(EPOCH FROM NOW() - created_at)::BIGINT
                ELSE first_response_secs
            END
        WHERE id = $1
        "#,
    )
    .bind(input.case_id)
    .bind(input.response_type.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(response)
}

/// Record a system message on a case, authored by `author_id`.
pub async fn add_system_note(
    pool: &PgPool,
    case_id: i64,
    author_id: i64,
    content: &str,
) -> Result<CaseResponse, sqlx::Error> {
    create_response(
        pool,
        &NewCaseResponse {
            case_id,
            response_type: ResponseType::System,
            content: content.to_string(),
            is_internal: Some(true),
            ..Default::default()
        },
        author_id,
    )
    .await
}

pub async fn get_visible_response(
    pool: &PgPool,
    id: i64,
    scope: CaseScope,
) -> Result<Option<CaseResponseItem>, sqlx::Error> {
    let query = format!("{RESPONSE_SELECT_SQL} WHERE {RESPONSE_FILTER_SQL} AND r.id = $7");
    sqlx::query_as::<_, CaseResponseItem>(&query)
        .bind(None::<i64>)
        .bind(None::<&str>)
        .bind(None::<bool>)
        .bind(None::<i64>)
        .bind(scope.mode())
        .bind(scope.user_id())
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_responses(
    pool: &PgPool,
    filter: &CaseResponseFilter,
    scope: CaseScope,
    page: PageRequest,
) -> Result<Vec<CaseResponseItem>, sqlx::Error> {
    let order = order_by(filter.ordering.as_deref(), RESPONSE_ORDERING, "r.created_at ASC");
    let query = format!(
        "{RESPONSE_SELECT_SQL} WHERE {RESPONSE_FILTER_SQL} ORDER BY {order}, r.id ASC LIMIT $7 OFFSET $8"
    );
    sqlx::query_as::<_, CaseResponseItem>(&query)
        .bind(filter.case)
        .bind(filter.response_type.map(|t| t.as_str()))
        .bind(filter.is_internal)
        .bind(filter.author)
        .bind(scope.mode())
        .bind(scope.user_id())
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_responses(
    pool: &PgPool,
    filter: &CaseResponseFilter,
    scope: CaseScope,
) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) {RESPONSE_FROM_SQL} WHERE {RESPONSE_FILTER_SQL}");
    let count: (i64,) = sqlx::query_as(&query)
        .bind(filter.case)
        .bind(filter.response_type.map(|t| t.as_str()))
        .bind(filter.is_internal)
        .bind(filter.author)
        .bind(scope.mode())
        .bind(scope.user_id())
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

pub async fn update_response(
    pool: &PgPool,
    id: i64,
    patch: &CaseResponsePatch,
) -> Result<Option<CaseResponse>, sqlx::Error> {
    sqlx::query_as::<_, CaseResponse>(
        r#"
        UPDATE case_responses SET
            content = COALESCE($2, content),
            response_type = COALESCE($3, response_type),
            is_internal = COALESCE($4, is_internal),
            email_subject = COALESCE($5, email_subject),
            email_to = COALESCE($6, email_to),
            email_cc = COALESCE($7, email_cc),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&patch.content)
    .bind(patch.response_type.map(|t| t.as_str()))
    .bind(patch.is_internal)
    .bind(&patch.email_subject)
    .bind(&patch.email_to)
    .bind(&patch.email_cc)
    .fetch_optional(pool)
    .await
}

/// Flag an email response as delivered, recording the outgoing message id.
pub async fn mark_email_sent(
    pool: &PgPool,
    id: i64,
    message_id: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE case_responses
        SET email_sent = TRUE, email_message_id = COALESCE($2, email_message_id), updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(message_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_response(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM case_responses WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
