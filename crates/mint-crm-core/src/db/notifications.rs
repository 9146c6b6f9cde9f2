// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-app notifications. Every query is scoped to a recipient.

use sqlx::PgPool;

use super::{PageRequest, order_by, search_pattern};
use crate::models::{NewNotification, Notification, NotificationFilter};

const NOTIFICATION_ORDERING: &[(&str, &str)] =
    &[("created_at", "created_at"), ("read_at", "read_at")];

const NOTIFICATION_FILTER_SQL: &str = r#"
    recipient_id = $1
    AND ($2::TEXT IS NULL OR notification_type = $2)
    AND ($3::BOOLEAN IS NULL OR is_read = $3)
    AND ($4::BOOLEAN IS NULL OR is_active = $4)
    AND ($5::TEXT IS NULL OR (title ILIKE $5 OR message ILIKE $5))
"#;

pub async fn create_notification(
    pool: &PgPool,
    input: &NewNotification,
) -> Result<Notification, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (notification_type, title, message, recipient_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(input.notification_type.as_str())
    .bind(&input.title)
    .bind(&input.message)
    .bind(input.recipient_id)
    .fetch_one(pool)
    .await
}

pub async fn get_notification(
    pool: &PgPool,
    id: i64,
    recipient_id: i64,
) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE id = $1 AND recipient_id = $2",
    )
    .bind(id)
    .bind(recipient_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_notifications(
    pool: &PgPool,
    recipient_id: i64,
    filter: &NotificationFilter,
    page: PageRequest,
) -> Result<Vec<Notification>, sqlx::Error> {
    let order = order_by(
        filter.ordering.as_deref(),
        NOTIFICATION_ORDERING,
        "created_at DESC",
    );
    let query = format!(
        "SELECT * FROM notifications WHERE {NOTIFICATION_FILTER_SQL} ORDER BY {order}, id DESC LIMIT $6 OFFSET $7"
    );
    sqlx::query_as::<_, Notification>(&query)
        .bind(recipient_id)
        .bind(filter.notification_type.map(|t| t.as_str()))
        .bind(filter.is_read)
        .bind(filter.is_active)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_notifications(
    pool: &PgPool,
    recipient_id: i64,
    filter: &NotificationFilter,
) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) FROM notifications WHERE {NOTIFICATION_FILTER_SQL}");
    let count: (i64,) = sqlx::query_as(&query)
        .bind(recipient_id)
        .bind(filter.notification_type.map(|t| t.as_str()))
        .bind(filter.is_read)
        .bind(filter.is_active)
        .bind(search_pattern(filter.search.as_deref()))
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

pub async fn mark_read(
    pool: &PgPool,
    id: i64,
    recipient_id: i64,
) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(
        r#"
        UPDATE notifications SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
        WHERE id = $1 AND recipient_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(recipient_id)
    .fetch_optional(pool)
    .await
}

/// Returns how many notifications changed.
pub async fn mark_all_read(pool: &PgPool, recipient_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE notifications SET is_read = TRUE, read_at = NOW()
        WHERE recipient_id = $1 AND NOT is_read
        "#,
    )
    .bind(recipient_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn unread_count(pool: &PgPool, recipient_id: i64) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT is_read AND is_active",
    )
    .bind(recipient_id)
    .fetch_one(pool)
    .await?;
    Ok(count.0)
}

pub async fn delete_notification(
    pool: &PgPool,
    id: i64,
    recipient_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
        .bind(id)
        .bind(recipient_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
