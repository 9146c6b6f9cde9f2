// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Email records and their delivery log.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{LabelCount, PageRequest, order_by, search_pattern};
use crate::models::{Email, EmailEvent, EmailFilter, EmailLog, EmailStatus, NewEmail};

const EMAIL_ORDERING: &[(&str, &str)] = &[("created_at", "created_at"), ("sent_at", "sent_at")];

const EMAIL_FILTER_SQL: &str = r#"
    ($1::BIGINT IS NULL OR user_id = $1)
    AND ($2::TEXT IS NULL OR email_type = $2)
    AND ($3::TEXT IS NULL OR status = $3)
    AND ($4::BIGINT IS NULL OR case_id = $4)
    AND ($5::BOOLEAN IS NULL OR is_starred = $5)
    AND ($6::BOOLEAN IS NULL OR is_archived = $6)
    AND ($7::BOOLEAN IS NULL OR is_read = $7)
    AND ($8::TEXT IS NULL OR (subject ILIKE $8 OR from_email ILIKE $8 OR to_emails ILIKE $8))
"#;

pub async fn create_email(pool: &PgPool, input: &NewEmail) -> Result<Email, sqlx::Error> {
    sqlx::query_as::<_, Email>(
        r#"
        INSERT INTO emails (
            email_type, status, subject, from_email, to_emails, cc_emails, bcc_emails,
            html_content, text_content, template_id, case_id, user_id, message_id,
            thread_id, reply_to
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING *
        "#,
    )
    .bind(input.email_type.as_str())
    .bind(input.status.as_str())
    .bind(&input.subject)
    .bind(&input.from_email)
    .bind(&input.to_emails)
    .bind(&input.cc_emails)
    .bind(&input.bcc_emails)
    .bind(&input.html_content)
    .bind(&input.text_content)
    .bind(input.template_id)
    .bind(input.case_id)
    .bind(input.user_id)
    .bind(&input.message_id)
    .bind(&input.thread_id)
    .bind(&input.reply_to)
    .fetch_one(pool)
    .await
}

pub async fn get_email(pool: &PgPool, id: i64) -> Result<Option<Email>, sqlx::Error> {
    sqlx::query_as::<_, Email>("SELECT * FROM emails WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// An email owned by `user_id`.
pub async fn get_user_email(
    pool: &PgPool,
    id: i64,
    user_id: i64,
) -> Result<Option<Email>, sqlx::Error> {
    sqlx::query_as::<_, Email>("SELECT * FROM emails WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Emails matching `filter`; `owner` limits the result to one user's mail.
pub async fn list_emails(
    pool: &PgPool,
    owner: Option<i64>,
    filter: &EmailFilter,
    page: PageRequest,
) -> Result<Vec<Email>, sqlx::Error> {
    let order = order_by(filter.ordering.as_deref(), EMAIL_ORDERING, "created_at DESC");
    let query = format!(
        "SELECT * FROM emails WHERE {EMAIL_FILTER_SQL} ORDER BY {order}, id DESC LIMIT $9 OFFSET $10"
    );
    sqlx::query_as::<_, Email>(&query)
        .bind(owner)
        .bind(filter.email_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.case)
        .bind(filter.is_starred)
        .bind(filter.is_archived)
        .bind(filter.is_read)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_emails(
    pool: &PgPool,
    owner: Option<i64>,
    filter: &EmailFilter,
) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) FROM emails WHERE {EMAIL_FILTER_SQL}");
    let count: (i64,) = sqlx::query_as(&query)
        .bind(owner)
        .bind(filter.email_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.case)
        .bind(filter.is_starred)
        .bind(filter.is_archived)
        .bind(filter.is_read)
        .bind(search_pattern(filter.search.as_deref()))
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

pub async fn delete_email(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM emails WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Status `sent`, stamping `sent_at` and the transport's message id.
pub async fn mark_sent(
    pool: &PgPool,
    id: i64,
    message_id: Option<&str>,
) -> Result<Option<Email>, sqlx::Error> {
    sqlx::query_as::<_, Email>(
        r#"
        UPDATE emails
        SET status = 'sent', sent_at = NOW(), error_message = '',
            message_id = COALESCE($2, message_id)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(message_id)
    .fetch_optional(pool)
    .await
}

/// Attach an email to a case.
pub async fn link_case(
    pool: &PgPool,
    id: i64,
    case_id: i64,
) -> Result<Option<Email>, sqlx::Error> {
    sqlx::query_as::<_, Email>("UPDATE emails SET case_id = $2 WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(case_id)
        .fetch_optional(pool)
        .await
}

pub async fn mark_read(pool: &PgPool, id: i64) -> Result<Option<Email>, sqlx::Error> {
    sqlx::query_as::<_, Email>("UPDATE emails SET is_read = TRUE WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn toggle_star(pool: &PgPool, id: i64) -> Result<Option<Email>, sqlx::Error> {
    sqlx::query_as::<_, Email>(
        "UPDATE emails SET is_starred = NOT is_starred WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn archive(pool: &PgPool, id: i64) -> Result<Option<Email>, sqlx::Error> {
    sqlx::query_as::<_, Email>("UPDATE emails SET is_archived = TRUE WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Emails waiting in the queue plus failed ones still under their retry budget.
pub async fn list_pending_delivery(pool: &PgPool, limit: i64) -> Result<Vec<Email>, sqlx::Error> {
    sqlx::query_as::<_, Email>(
        r#"
        SELECT * FROM emails
        WHERE status = 'queued' OR (status = 'failed' AND retry_count < max_retries)
        ORDER BY created_at ASC, id ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Delete archived or finished emails created before `cutoff`.
pub async fn delete_older_than(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM emails
        WHERE created_at < $1
          AND (is_archived OR status IN ('sent', 'delivered', 'failed', 'bounced'))
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn add_log(
    pool: &PgPool,
    email_id: i64,
    event: EmailEvent,
    data: &serde_json::Value,
) -> Result<EmailLog, sqlx::Error> {
    sqlx::query_as::<_, EmailLog>(
        "INSERT INTO email_logs (email_id, event, data) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(email_id)
    .bind(event.as_str())
    .bind(data)
    .fetch_one(pool)
    .await
}

pub async fn list_logs(pool: &PgPool, email_id: i64) -> Result<Vec<EmailLog>, sqlx::Error> {
    sqlx::query_as::<_, EmailLog>(
        "SELECT * FROM email_logs WHERE email_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(email_id)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EmailStats {
    pub total: i64,
    pub sent: i64,
    pub delivered: i64,
    pub failed: i64,
    pub bounced: i64,
    pub by_type: Vec<LabelCount>,
    pub by_status: Vec<LabelCount>,
}

/// Counters over emails created since `since`, optionally for one user.
pub async fn email_stats(
    pool: &PgPool,
    owner: Option<i64>,
    since: DateTime<Utc>,
) -> Result<EmailStats, sqlx::Error> {
    let totals: (i64, i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE status = 'sent'),
               COUNT(*) FILTER (WHERE status = 'delivered'),
               COUNT(*) FILTER (WHERE status = 'failed'),
               COUNT(*) FILTER (WHERE status = 'bounced')
        FROM emails
        WHERE ($1::BIGINT IS NULL OR user_id = $1) AND created_at >= $2
        "#,
    )
    .bind(owner)
    .bind(since)
    .fetch_one(pool)
    .await?;

    let mut groups = Vec::with_capacity(2);
    for column in ["email_type", "status"] {
        let query = format!(
            r#"
            SELECT {column} AS label, COUNT(*) AS count
            FROM emails
            WHERE ($1::BIGINT IS NULL OR user_id = $1) AND created_at >= $2
            GROUP BY {column}
            ORDER BY count DESC, label
            "#
        );
        let rows = sqlx::query_as::<_, LabelCount>(&query)
            .bind(owner)
            .bind(since)
            .fetch_all(pool)
            .await?;
        groups.push(rows);
    }
    let by_status = groups.pop().unwrap_or_default();
    let by_type = groups.pop().unwrap_or_default();

    Ok(EmailStats {
        total: totals.0,
        sent: totals.1,
        delivered: totals.2,
        failed: totals.3,
        bounced: totals.4,
        by_type,
        by_status,
    })
}
