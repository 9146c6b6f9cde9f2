// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Companies.

use sqlx::PgPool;

use super::{LabelCount, PageRequest, order_by, search_pattern};
use crate::models::{Company, CompanyFilter, CompanyInput};

const COMPANY_ORDERING: &[(&str, &str)] = &[
    ("name", "name"),
    ("created_at", "created_at"),
    ("updated_at", "updated_at"),
];

const COMPANY_FILTER_SQL: &str = r#"
    ($1::TEXT IS NULL OR industry = $1)
    AND ($2::BOOLEAN IS NULL OR is_active = $2)
    AND ($3::BOOLEAN IS NULL OR is_customer = $3)
    AND ($4::BOOLEAN IS NULL OR is_prospect = $4)
    AND ($5::TEXT IS NULL OR (name ILIKE $5 OR description ILIKE $5 OR city ILIKE $5))
"#;

pub async fn create_company(pool: &PgPool, input: &CompanyInput) -> Result<Company, sqlx::Error> {
    sqlx::query_as::<_, Company>(
        r#"
        INSERT INTO companies (
            name, industry, website, phone, address, city, state, country,
            postal_code, description, annual_revenue, employee_count,
            is_active, is_customer, is_prospect
        ) VALUES (
            $1, COALESCE($2, 'other'), COALESCE($3, ''), COALESCE($4, ''), COALESCE($5, ''),
            COALESCE($6, ''), COALESCE($7, ''), COALESCE($8, ''), COALESCE($9, ''),
            COALESCE($10, ''), $11, $12, COALESCE($13, TRUE), COALESCE($14, FALSE),
            COALESCE($15, TRUE)
        )
        RETURNING *
        "#,
    )
    .bind(input.name.as_deref().unwrap_or_default())
    .bind(input.industry.map(|i| i.as_str()))
    .bind(&input.website)
    .bind(&input.phone)
    .bind(&input.address)
    .bind(&input.city)
    .bind(&input.state)
    .bind(&input.country)
    .bind(&input.postal_code)
    .bind(&input.description)
    .bind(input.annual_revenue)
    .bind(input.employee_count)
    .bind(input.is_active)
    .bind(input.is_customer)
    .bind(input.is_prospect)
    .fetch_one(pool)
    .await
}

pub async fn get_company(pool: &PgPool, id: i64) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_company(
    pool: &PgPool,
    id: i64,
    input: &CompanyInput,
) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>(
        r#"
        UPDATE companies SET
            name = COALESCE($2, name),
            industry = COALESCE($3, industry),
            website = COALESCE($4, website),
            phone = COALESCE($5, phone),
            address = COALESCE($6, address),
            city = COALESCE($7, city),
            state = COALESCE($8, state),
            country = COALESCE($9, country),
            postal_code = COALESCE($10, postal_code),
            description = COALESCE($11, description),
            annual_revenue = COALESCE($12, annual_revenue),
            employee_count = COALESCE($13, employee_count),
            is_active = COALESCE($14, is_active),
            is_customer = COALESCE($15, is_customer),
            is_prospect = COALESCE($16, is_prospect),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.name)
    .bind(input.industry.map(|i| i.as_str()))
    .bind(&input.website)
    .bind(&input.phone)
    .bind(&input.address)
    .bind(&input.city)
    .bind(&input.state)
    .bind(&input.country)
    .bind(&input.postal_code)
    .bind(&input.description)
    .bind(input.annual_revenue)
    .bind(input.employee_count)
    .bind(input.is_active)
    .bind(input.is_customer)
    .bind(input.is_prospect)
    .fetch_optional(pool)
    .await
}

pub async fn delete_company(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM companies WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_companies(
    pool: &PgPool,
    filter: &CompanyFilter,
    page: PageRequest,
) -> Result<Vec<Company>, sqlx::Error> {
    let order = order_by(filter.ordering.as_deref(), COMPANY_ORDERING, "name ASC");
    let query = format!(
        "SELECT * FROM companies WHERE {COMPANY_FILTER_SQL} ORDER BY {order}, id ASC LIMIT $6 OFFSET $7"
    );
    sqlx::query_as::<_, Company>(&query)
        .bind(filter.industry.map(|i| i.as_str()))
        .bind(filter.is_active)
        .bind(filter.is_customer)
        .bind(filter.is_prospect)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_companies(pool: &PgPool, filter: &CompanyFilter) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) FROM companies WHERE {COMPANY_FILTER_SQL}");
    let count: (i64,) = sqlx::query_as(&query)
        .bind(filter.industry.map(|i| i.as_str()))
        .bind(filter.is_active)
        .bind(filter.is_customer)
        .bind(filter.is_prospect)
        .bind(search_pattern(filter.search.as_deref()))
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Company totals for the stats endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CompanyStats {
    pub total_companies: i64,
    pub customers: i64,
    pub prospects: i64,
    pub by_industry: Vec<LabelCount>,
}

pub async fn company_stats(pool: &PgPool) -> Result<CompanyStats, sqlx::Error> {
    let totals: (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE is_customer),
               COUNT(*) FILTER (WHERE is_prospect)
        FROM companies
        "#,
    )
    .fetch_one(pool)
    .await?;

    let by_industry = sqlx::query_as::<_, LabelCount>(
        r#"
        SELECT industry AS label, COUNT(*) AS count
        FROM companies
        GROUP BY industry
        ORDER BY count DESC, label
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(CompanyStats {
        total_companies: totals.0,
        customers: totals.1,
        prospects: totals.2,
        by_industry,
    })
}
