// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database migrations for MINT CRM.
//!
//! The schema is embedded at compile time from `crates/mint-crm-core/migrations`
//! and applied by the server on startup and by `mint-crm-ctl migrate`.
//!
//! # Example
//!
//! ```ignore
//! use sqlx::PgPool;
//! use mint_crm_core::migrations;
//!
//! let pool = PgPool::connect(&database_url).await?;
//! migrations::run(&pool).await?;
//! ```

use sqlx::migrate::{MigrateError, Migrator};

/// PostgreSQL migrator for the CRM schema.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run all pending migrations.
///
/// Safe to call multiple times; already-applied migrations are skipped.
pub async fn run(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}
