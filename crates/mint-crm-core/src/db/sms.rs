// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SMS records and their log.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{LabelCount, PageRequest, order_by, search_pattern};
use crate::models::{NewSms, Sms, SmsEvent, SmsFilter, SmsLog};
use crate::permissions::SmsScope;

const SMS_ORDERING: &[(&str, &str)] = &[("created_at", "s.created_at"), ("sent_at", "s.sent_at")];

const SMS_SCOPE_SQL: &str = r#"
    ($1::TEXT = 'all'
        OR ($1::TEXT = 'own' AND s.user_id = $2)
        OR ($1::TEXT = 'agent' AND (
            s.user_id = $2
            OR EXISTS (SELECT 1 FROM cases c WHERE c.id = s.case_id AND c.assigned_to_id = $2)
        )))
"#;

const SMS_FILTER_SQL: &str = r#"
    ($3::TEXT IS NULL OR s.sms_type = $3)
    AND ($4::TEXT IS NULL OR s.status = $4)
    AND ($5::BIGINT IS NULL OR s.case_id = $5)
    AND ($6::BIGINT IS NULL OR s.contact_id = $6)
    AND ($7::TEXT IS NULL OR (s.message ILIKE $7 OR s.to_number ILIKE $7))
"#;

pub async fn create_sms(pool: &PgPool, input: &NewSms) -> Result<Sms, sqlx::Error> {
    sqlx::query_as::<_, Sms>(
        r#"
        INSERT INTO sms_messages (
            sms_type, status, message, from_number, to_number, template_id, case_id,
            user_id, contact_id, message_id, error_message, sent_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(input.sms_type.as_str())
    .bind(input.status.as_str())
    .bind(&input.message)
    .bind(&input.from_number)
    .bind(&input.to_number)
    .bind(input.template_id)
    .bind(input.case_id)
    .bind(input.user_id)
    .bind(input.contact_id)
    .bind(&input.message_id)
    .bind(&input.error_message)
    .bind(input.sent_at)
    .fetch_one(pool)
    .await
}

pub async fn get_sms(pool: &PgPool, id: i64) -> Result<Option<Sms>, sqlx::Error> {
    sqlx::query_as::<_, Sms>("SELECT * FROM sms_messages WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_visible_sms(
    pool: &PgPool,
    id: i64,
    scope: SmsScope,
) -> Result<Option<Sms>, sqlx::Error> {
    let query = format!("SELECT s.* FROM sms_messages s WHERE {SMS_SCOPE_SQL} AND s.id = $3");
    sqlx::query_as::<_, Sms>(&query)
        .bind(scope.mode())
        .bind(scope.user_id())
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_sms(
    pool: &PgPool,
    filter: &SmsFilter,
    scope: SmsScope,
    page: PageRequest,
) -> Result<Vec<Sms>, sqlx::Error> {
    let order = order_by(filter.ordering.as_deref(), SMS_ORDERING, "s.created_at DESC");
    let query = format!(
        r#"
        SELECT s.* FROM sms_messages s
        WHERE {SMS_SCOPE_SQL} AND {SMS_FILTER_SQL}
        ORDER BY {order}, s.id DESC
        LIMIT $8 OFFSET $9
        "#
    );
    sqlx::query_as::<_, Sms>(&query)
        .bind(scope.mode())
        .bind(scope.user_id())
        .bind(filter.sms_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.case)
        .bind(filter.contact)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_sms(
    pool: &PgPool,
    filter: &SmsFilter,
    scope: SmsScope,
) -> Result<i64, sqlx::Error> {
    let query = format!(
        "SELECT COUNT(*) FROM sms_messages s WHERE {SMS_SCOPE_SQL} AND {SMS_FILTER_SQL}"
    );
    let count: (i64,) = sqlx::query_as(&query)
        .bind(scope.mode())
        .bind(scope.user_id())
        .bind(filter.sms_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.case)
        .bind(filter.contact)
        .bind(search_pattern(filter.search.as_deref()))
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

pub async fn mark_sent(
    pool: &PgPool,
    id: i64,
    message_id: Option<&str>,
) -> Result<Option<Sms>, sqlx::Error> {
    sqlx::query_as::<_, Sms>(
        r#"
        UPDATE sms_messages
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

pub async fn mark_failed(pool: &PgPool, id: i64, error: &str) -> Result<Option<Sms>, sqlx::Error> {
    sqlx::query_as::<_, Sms>(
        r#"
        UPDATE sms_messages
        SET status = 'failed', error_message = $2, retry_count = retry_count + 1
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(error)
    .fetch_optional(pool)
    .await
}

pub async fn mark_read(pool: &PgPool, id: i64) -> Result<Option<Sms>, sqlx::Error> {
    sqlx::query_as::<_, Sms>(
        r#"
        UPDATE sms_messages SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn toggle_star(pool: &PgPool, id: i64) -> Result<Option<Sms>, sqlx::Error> {
    sqlx::query_as::<_, Sms>(
        "UPDATE sms_messages SET is_starred = NOT is_starred WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_sms(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sms_messages WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn add_log(
    pool: &PgPool,
    sms_id: i64,
    event: SmsEvent,
    data: &serde_json::Value,
) -> Result<SmsLog, sqlx::Error> {
    sqlx::query_as::<_, SmsLog>(
        "INSERT INTO sms_logs (sms_id, event, data) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(sms_id)
    .bind(event.as_str())
    .bind(data)
    .fetch_one(pool)
    .await
}

pub async fn list_logs(pool: &PgPool, sms_id: i64) -> Result<Vec<SmsLog>, sqlx::Error> {
    sqlx::query_as::<_, SmsLog>(
        "SELECT * FROM sms_logs WHERE sms_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(sms_id)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SmsStats {
    pub total: i64,
    pub sent: i64,
    pub delivered: i64,
    pub failed: i64,
    pub by_type: Vec<LabelCount>,
    pub by_status: Vec<LabelCount>,
}

pub async fn sms_stats(
    pool: &PgPool,
    scope: SmsScope,
    since: DateTime<Utc>,
) -> Result<SmsStats, sqlx::Error> {
    let totals_sql = format!(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE s.status = 'sent'),
               COUNT(*) FILTER (WHERE s.status = 'delivered'),
               COUNT(*) FILTER (WHERE s.status = 'failed')
        FROM sms_messages s
        WHERE {SMS_SCOPE_SQL} AND s.created_at >= $3
        "#
    );
    let totals: (i64, i64, i64, i64) = sqlx::query_as(&totals_sql)
        .bind(scope.mode())
        .bind(scope.user_id())
        .bind(since)
        .fetch_one(pool)
        .await?;

    let mut groups = Vec::with_capacity(2);
    for column in ["s.sms_type", "s.status"] {
        let query = format!(
            r#"
            SELECT {column} AS label, COUNT(*) AS count
            FROM sms_messages s
            WHERE {SMS_SCOPE_SQL} AND s.created_at >= $3
            GROUP BY {column}
            ORDER BY count DESC, label
            "#
        );
        let rows = sqlx::query_as::<_, LabelCount>(&query)
            .bind(scope.mode())
            .bind(scope.user_id())
            .bind(since)
            .fetch_all(pool)
            .await?;
        groups.push(rows);
    }
    let by_status = groups.pop().unwrap_or_default();
    let by_type = groups.pop().unwrap_or_default();

    Ok(SmsStats {
        total: totals.0,
        sent: totals.1,
        delivered: totals.2,
        failed: totals.3,
        by_type,
        by_status,
    })
}
