// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sends queued emails and retries failed ones that have attempts left.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::{env_flag, env_u64};
use crate::db;
use crate::messaging::EmailService;

#[derive(Debug, Clone)]
pub struct EmailQueueWorkerConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
    /// Emails picked up per cycle.
    pub batch_size: i64,
}

impl Default for EmailQueueWorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(300),
            batch_size: 100,
        }
    }
}

impl EmailQueueWorkerConfig {
    /// Environment variables:
    /// - `MINT_CRM_EMAIL_QUEUE_ENABLED` (default: true)
    /// - `MINT_CRM_EMAIL_QUEUE_INTERVAL_SECS` (default: 300)
    pub fn from_env() -> Self {
        Self {
            enabled: env_flag("MINT_CRM_EMAIL_QUEUE_ENABLED", true),
            poll_interval: Duration::from_secs(env_u64("MINT_CRM_EMAIL_QUEUE_INTERVAL_SECS", 300)),
            ..Default::default()
        }
    }
}

/// Counters for one queue pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueRun {
    pub sent: usize,
    pub failed: usize,
}

pub struct EmailQueueWorker {
    pool: PgPool,
    emails: EmailService,
    config: EmailQueueWorkerConfig,
    shutdown: Arc<Notify>,
}

impl EmailQueueWorker {
    pub fn new(pool: PgPool, emails: EmailService, config: EmailQueueWorkerConfig) -> Self {
        Self {
            pool,
            emails,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    pub async fn run(&self) {
        if !self.config.enabled {
            info!("Email queue worker disabled");
            return;
        }

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            "Email queue worker started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Email queue worker received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(e) = self.process_queue().await {
                        error!(error = %e, "Failed to process email queue");
                    }
                }
            }
        }

        info!("Email queue worker stopped");
    }

    /// Deliver every pending email once.
    pub async fn process_queue(&self) -> crate::Result<QueueRun> {
        let pending = db::emails::list_pending_delivery(&self.pool, self.config.batch_size).await?;
        let mut run = QueueRun::default();

        for email in pending {
            match self.emails.deliver(&email).await {
                Ok(_) => run.sent += 1,
                Err(e) => {
                    warn!(email_id = email.id, error = %e, "Queued email delivery failed");
                    run.failed += 1;
                }
            }
        }

        if run.sent + run.failed > 0 {
            info!(sent = run.sent, failed = run.failed, "Email queue processed");
        } else {
            debug!("Email queue empty");
        }
        Ok(run)
    }
}
