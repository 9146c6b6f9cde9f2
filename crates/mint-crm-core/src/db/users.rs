// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! User accounts.

use sqlx::PgPool;

use super::{PageRequest, order_by, search_pattern};
use crate::models::{NewUser, User, UserFilter, UserPatch, UserRole};

const USER_ORDERING: &[(&str, &str)] = &[
    ("email", "email"),
    ("first_name", "first_name"),
    ("last_name", "last_name"),
    ("date_joined", "date_joined"),
    ("role", "role"),
];

const USER_FILTER_SQL: &str = r#"
    ($1::TEXT IS NULL OR role = $1)
    AND ($2::TEXT IS NULL OR department = $2)
    AND ($3::BOOLEAN IS NULL OR is_active = $3)
    AND ($4::TEXT IS NULL OR (
        email ILIKE $4 OR first_name ILIKE $4 OR last_name ILIKE $4 OR phone ILIKE $4
    ))
"#;

/// Insert a user. Emails are stored lower-cased.
pub async fn create_user(pool: &PgPool, user: &NewUser) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (
            email, password_hash, first_name, last_name, role,
            company, phone, department, is_active
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(user.email.trim().to_lowercase())
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(user.role.as_str())
    .bind(&user.company)
    .bind(&user.phone)
    .bind(&user.department)
    .bind(user.is_active)
    .fetch_one(pool)
    .await
}

pub async fn get_user(pool: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await
}

pub async fn list_users(
    pool: &PgPool,
    filter: &UserFilter,
    page: PageRequest,
) -> Result<Vec<User>, sqlx::Error> {
    let order = order_by(filter.ordering.as_deref(), USER_ORDERING, "email ASC");
    let query = format!(
        "SELECT * FROM users WHERE {USER_FILTER_SQL} ORDER BY {order}, id ASC LIMIT $5 OFFSET $6"
    );
    sqlx::query_as::<_, User>(&query)
        .bind(filter.role.map(|r| r.as_str()))
        .bind(&filter.department)
        .bind(filter.is_active)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_users(pool: &PgPool, filter: &UserFilter) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) FROM users WHERE {USER_FILTER_SQL}");
    let count: (i64,) = sqlx::query_as(&query)
        .bind(filter.role.map(|r| r.as_str()))
        .bind(&filter.department)
        .bind(filter.is_active)
        .bind(search_pattern(filter.search.as_deref()))
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Apply a partial profile update. Returns `None` if the user does not exist.
pub async fn update_user(
    pool: &PgPool,
    id: i64,
    patch: &UserPatch,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            email = COALESCE($2, email),
            first_name = COALESCE($3, first_name),
            last_name = COALESCE($4, last_name),
            role = COALESCE($5, role),
            company = COALESCE($6, company),
            phone = COALESCE($7, phone),
            department = COALESCE($8, department),
            is_active = COALESCE($9, is_active)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(patch.email.as_ref().map(|e| e.trim().to_lowercase()))
    .bind(&patch.first_name)
    .bind(&patch.last_name)
    .bind(patch.role.map(|r| r.as_str()))
    .bind(&patch.company)
    .bind(&patch.phone)
    .bind(&patch.department)
    .bind(patch.is_active)
    .fetch_optional(pool)
    .await
}

pub async fn set_password_hash(pool: &PgPool, id: i64, hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(id)
        .bind(hash)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn touch_last_login(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a user. Returns whether a row was removed.
pub async fn delete_user(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Active users holding any of `roles`, by name.
pub async fn list_active_with_roles(
    pool: &PgPool,
    roles: &[UserRole],
) -> Result<Vec<User>, sqlx::Error> {
    let roles: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
    sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users
        WHERE is_active AND role = ANY($1)
        ORDER BY first_name, last_name, id
        "#,
    )
    .bind(roles)
    .fetch_all(pool)
    .await
}

/// The manager (or admin) escalations go to: the longest-standing active one.
pub async fn first_manager(pool: &PgPool) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users
        WHERE is_active AND role IN ('manager', 'admin')
        ORDER BY id
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await
}

/// Active agent or manager with the fewest open cases. Ties go to the lowest id.
pub async fn least_loaded_agent(pool: &PgPool) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.* FROM users u
        LEFT JOIN cases c
            ON c.assigned_to_id = u.id
           AND c.status IN ('new', 'assigned', 'in_progress')
        WHERE u.is_active AND u.role IN ('agent', 'manager')
        GROUP BY u.id
        ORDER BY COUNT(c.id) ASC, u.id ASC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await
}
