// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-user SMTP/IMAP settings. Each user owns at most one row.

use sqlx::PgPool;

use crate::models::{UserEmailConfig, UserEmailConfigInput};

/// Create the caller's config, or update it in place when one exists.
pub async fn upsert_config(
    pool: &PgPool,
    user_id: i64,
    input: &UserEmailConfigInput,
) -> Result<UserEmailConfig, sqlx::Error> {
    let defaults = input.provider.unwrap_or_default().defaults();
    sqlx::query_as::<_, UserEmailConfig>(
        r#"
        INSERT INTO user_email_configs (
            user_id, email_address, display_name, provider, smtp_host, smtp_port,
            smtp_username, smtp_password, smtp_use_tls, smtp_use_ssl, imap_host,
            imap_port, imap_username, imap_password, imap_use_ssl, is_active
        ) VALUES (
            $1, COALESCE($2, ''), COALESCE($3, ''), COALESCE($4, 'custom'),
            COALESCE($5, $17), COALESCE($6, 587), COALESCE($7, ''), COALESCE($8, ''),
            COALESCE($9, TRUE), COALESCE($10, FALSE), COALESCE($11, $18),
            COALESCE($12, 993), COALESCE($13, ''), COALESCE($14, ''),
            COALESCE($15, TRUE), COALESCE($16, TRUE)
        )
        ON CONFLICT (user_id) DO UPDATE SET
            email_address = COALESCE($2, user_email_configs.email_address),
            display_name = COALESCE($3, user_email_configs.display_name),
            provider = COALESCE($4, user_email_configs.provider),
            smtp_host = COALESCE($5, user_email_configs.smtp_host),
            smtp_port = COALESCE($6, user_email_configs.smtp_port),
            smtp_username = COALESCE($7, user_email_configs.smtp_username),
            smtp_password = COALESCE($8, user_email_configs.smtp_password),
            smtp_use_tls = COALESCE($9, user_email_configs.smtp_use_tls),
            smtp_use_ssl = COALESCE($10, user_email_configs.smtp_use_ssl),
            imap_host = COALESCE($11, user_email_configs.imap_host),
            imap_port = COALESCE($12, user_email_configs.imap_port),
            imap_username = COALESCE($13, user_email_configs.imap_username),
            imap_password = COALESCE($14, user_email_configs.imap_password),
            imap_use_ssl = COALESCE($15, user_email_configs.imap_use_ssl),
            is_active = COALESCE($16, user_email_configs.is_active),
            is_verified = FALSE,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&input.email_address)
    .bind(&input.display_name)
    .bind(input.provider.map(|p| p.as_str()))
    .bind(&input.smtp_host)
    .bind(input.smtp_port)
    .bind(&input.smtp_username)
    .bind(&input.smtp_password)
    .bind(input.smtp_use_tls)
    .bind(input.smtp_use_ssl)
    .bind(&input.imap_host)
    .bind(input.imap_port)
    .bind(&input.imap_username)
    .bind(&input.imap_password)
    .bind(input.imap_use_ssl)
    .bind(input.is_active)
    .bind(defaults.smtp_host)
    .bind(defaults.imap_host)
    .fetch_one(pool)
    .await
}

pub async fn get_config(pool: &PgPool, id: i64) -> Result<Option<UserEmailConfig>, sqlx::Error> {
    sqlx::query_as::<_, UserEmailConfig>("SELECT * FROM user_email_configs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_config_for_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<UserEmailConfig>, sqlx::Error> {
    sqlx::query_as::<_, UserEmailConfig>("SELECT * FROM user_email_configs WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// The user's config when it is usable for sending.
pub async fn get_sending_config(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<UserEmailConfig>, sqlx::Error> {
    sqlx::query_as::<_, UserEmailConfig>(
        "SELECT * FROM user_email_configs WHERE user_id = $1 AND is_active AND is_verified",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn set_verified(
    pool: &PgPool,
    id: i64,
    verified: bool,
) -> Result<Option<UserEmailConfig>, sqlx::Error> {
    sqlx::query_as::<_, UserEmailConfig>(
        r#"
        UPDATE user_email_configs SET is_verified = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(verified)
    .fetch_optional(pool)
    .await
}

pub async fn delete_config(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM user_email_configs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
