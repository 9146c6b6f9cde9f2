// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SMS templates.

use sqlx::PgPool;

use super::{PageRequest, order_by, search_pattern};
use crate::models::{SmsTemplate, SmsTemplateInput, TemplateFilter, TemplateType};

const TEMPLATE_ORDERING: &[(&str, &str)] = &[
    ("name", "name"),
    ("template_type", "template_type"),
    ("created_at", "created_at"),
];

const TEMPLATE_FILTER_SQL: &str = r#"
    ($1::TEXT IS NULL OR template_type = $1)
    AND ($2::BOOLEAN IS NULL OR is_active = $2)
    AND ($3::TEXT IS NULL OR (name ILIKE $3 OR message ILIKE $3))
"#;

pub async fn create_template(
    pool: &PgPool,
    input: &SmsTemplateInput,
    created_by_id: Option<i64>,
) -> Result<SmsTemplate, sqlx::Error> {
    sqlx::query_as::<_, SmsTemplate>(
        r#"
        INSERT INTO sms_templates (
            name, template_type, message, variables, is_active, created_by_id
        )
        VALUES ($1, COALESCE($2, 'custom'), $3, COALESCE($4, '{}'::jsonb), COALESCE($5, TRUE), $6)
        RETURNING *
        "#,
    )
    .bind(input.name.as_deref().unwrap_or_default())
    .bind(input.template_type.map(|t| t.as_str()))
    .bind(input.message.as_deref().unwrap_or_default())
    .bind(&input.variables)
    .bind(input.is_active)
    .bind(created_by_id)
    .fetch_one(pool)
    .await
}

pub async fn get_template(pool: &PgPool, id: i64) -> Result<Option<SmsTemplate>, sqlx::Error> {
    sqlx::query_as::<_, SmsTemplate>("SELECT * FROM sms_templates WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn template_exists(
    pool: &PgPool,
    name: &str,
    template_type: TemplateType,
) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM sms_templates WHERE name = $1 AND template_type = $2)",
    )
    .bind(name)
    .bind(template_type.as_str())
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn update_template(
    pool: &PgPool,
    id: i64,
    input: &SmsTemplateInput,
) -> Result<Option<SmsTemplate>, sqlx::Error> {
    sqlx::query_as::<_, SmsTemplate>(
        r#"
        UPDATE sms_templates SET
            name = COALESCE($2, name),
            template_type = COALESCE($3, template_type),
            message = COALESCE($4, message),
            variables = COALESCE($5, variables),
            is_active = COALESCE($6, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.name)
    .bind(input.template_type.map(|t| t.as_str()))
    .bind(&input.message)
    .bind(&input.variables)
    .bind(input.is_active)
    .fetch_optional(pool)
    .await
}

pub async fn delete_template(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sms_templates WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_templates(
    pool: &PgPool,
    filter: &TemplateFilter,
    page: PageRequest,
) -> Result<Vec<SmsTemplate>, sqlx::Error> {
    let order = order_by(
        filter.ordering.as_deref(),
        TEMPLATE_ORDERING,
        "template_type ASC, name ASC",
    );
    let query = format!(
        "SELECT * FROM sms_templates WHERE {TEMPLATE_FILTER_SQL} ORDER BY {order}, id ASC LIMIT $4 OFFSET $5"
    );
    sqlx::query_as::<_, SmsTemplate>(&query)
        .bind(filter.template_type.map(|t| t.as_str()))
        .bind(filter.is_active)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_templates(pool: &PgPool, filter: &TemplateFilter) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) FROM sms_templates WHERE {TEMPLATE_FILTER_SQL}");
    let count: (i64,) = sqlx::query_as(&query)
        .bind(filter.template_type.map(|t| t.as_str()))
        .bind(filter.is_active)
        .bind(search_pattern(filter.search.as_deref()))
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}
