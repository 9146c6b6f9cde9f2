// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-user SMS provider settings.

use sqlx::PgPool;

use crate::models::{UserSmsConfig, UserSmsConfigInput};

pub async fn upsert_config(
    pool: &PgPool,
    user_id: i64,
    input: &UserSmsConfigInput,
) -> Result<UserSmsConfig, sqlx::Error> {
    sqlx::query_as::<_, UserSmsConfig>(
        r#"
        INSERT INTO user_sms_configs (
            user_id, provider, account_sid, auth_token, api_key, api_secret,
            from_number, webhook_url, is_active
        ) VALUES (
            $1, COALESCE($2, 'custom'), COALESCE($3, ''), COALESCE($4, ''),
            COALESCE($5, ''), COALESCE($6, ''), COALESCE($7, ''), COALESCE($8, ''),
            COALESCE($9, TRUE)
        )
        ON CONFLICT (user_id) DO UPDATE SET
            provider = COALESCE($2, user_sms_configs.provider),
            account_sid = COALESCE($3, user_sms_configs.account_sid),
            auth_token = COALESCE($4, user_sms_configs.auth_token),
            api_key = COALESCE($5, user_sms_configs.api_key),
            api_secret = COALESCE($6, user_sms_configs.api_secret),
            from_number = COALESCE($7, user_sms_configs.from_number),
            webhook_url = COALESCE($8, user_sms_configs.webhook_url),
            is_active = COALESCE($9, user_sms_configs.is_active),
            is_verified = FALSE,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(input.provider.map(|p| p.as_str()))
    .bind(&input.account_sid)
    .bind(&input.auth_token)
    .bind(&input.api_key)
    .bind(&input.api_secret)
    .bind(&input.from_number)
    .bind(&input.webhook_url)
    .bind(input.is_active)
    .fetch_one(pool)
    .await
}

pub async fn get_config(pool: &PgPool, id: i64) -> Result<Option<UserSmsConfig>, sqlx::Error> {
    sqlx::query_as::<_, UserSmsConfig>("SELECT * FROM user_sms_configs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_config_for_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<UserSmsConfig>, sqlx::Error> {
    sqlx::query_as::<_, UserSmsConfig>("SELECT * FROM user_sms_configs WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn set_verified(
    pool: &PgPool,
    id: i64,
    verified: bool,
) -> Result<Option<UserSmsConfig>, sqlx::Error> {
    sqlx::query_as::<_, UserSmsConfig>(
        "UPDATE user_sms_configs SET is_verified = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(verified)
    .fetch_optional(pool)
    .await
}

pub async fn delete_config(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM user_sms_configs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
