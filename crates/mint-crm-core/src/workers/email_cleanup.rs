// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deletes old emails.
//!
//! Archived emails and emails in a terminal delivery state (sent, delivered,
//! failed, bounced) created before the retention window are removed together
//! with their logs. Drafts and queued emails are never touched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use super::{env_flag, env_u64};
use crate::db;

#[derive(Debug, Clone)]
pub struct EmailCleanupWorkerConfig {
    /// Off unless explicitly enabled.
    pub enabled: bool,
    pub poll_interval: Duration,
    pub max_age: Duration,
}

impl Default for EmailCleanupWorkerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval: Duration::from_secs(86400),
            max_age: Duration::from_secs(90 * 24 * 3600),
        }
    }
}

impl EmailCleanupWorkerConfig {
    /// Environment variables:
    /// - `MINT_CRM_EMAIL_CLEANUP_ENABLED` (default: false)
    /// - `MINT_CRM_EMAIL_CLEANUP_INTERVAL_SECS` (default: 86400)
    /// - `MINT_CRM_EMAIL_CLEANUP_MAX_AGE_DAYS` (default: 90)
    pub fn from_env() -> Self {
        let max_age_days = env_u64("MINT_CRM_EMAIL_CLEANUP_MAX_AGE_DAYS", 90);
        Self {
            enabled: env_flag("MINT_CRM_EMAIL_CLEANUP_ENABLED", false),
            poll_interval: Duration::from_secs(env_u64(
                "MINT_CRM_EMAIL_CLEANUP_INTERVAL_SECS",
                86400,
            )),
            max_age: Duration::from_secs(max_age_days * 24 * 3600),
        }
    }
}

pub struct EmailCleanupWorker {
    pool: PgPool,
    config: EmailCleanupWorkerConfig,
    shutdown: Arc<Notify>,
}

impl EmailCleanupWorker {
    pub fn new(pool: PgPool, config: EmailCleanupWorkerConfig) -> Self {
        Self {
            pool,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    pub async fn run(&self) {
        if !self.config.enabled {
            info!("Email cleanup worker disabled");
            return;
        }

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            max_age_days = self.config.max_age.as_secs() / 86400,
            "Email cleanup worker started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Email cleanup worker received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(e) = self.cleanup_old_emails().await {
                        error!(error = %e, "Failed to clean up old emails");
                    }
                }
            }
        }

        info!("Email cleanup worker stopped");
    }

    pub async fn cleanup_old_emails(&self) -> crate::Result<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.max_age)
                .map_err(|e| crate::Error::Other(format!("Invalid duration: {e}")))?;

        let deleted = db::emails::delete_older_than(&self.pool, cutoff).await?;
        if deleted > 0 {
            info!(deleted, cutoff = %cutoff, "Email cleanup cycle completed");
        } else {
            debug!("Email cleanup cycle completed, nothing to delete");
        }
        Ok(deleted)
    }
}
