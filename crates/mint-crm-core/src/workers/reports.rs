// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Daily generation of automated reports.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::Notify;
use tracing::{error, info};

use super::{env_flag, env_u64};
use crate::db;
use crate::models::ExecutionStatus;

#[derive(Debug, Clone)]
pub struct ReportWorkerConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
}

impl Default for ReportWorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(86400),
        }
    }
}

impl ReportWorkerConfig {
    /// Environment variables:
    /// - `MINT_CRM_REPORTS_ENABLED` (default: true)
    /// - `MINT_CRM_REPORTS_INTERVAL_SECS` (default: 86400)
    pub fn from_env() -> Self {
        Self {
            enabled: env_flag("MINT_CRM_REPORTS_ENABLED", true),
            poll_interval: Duration::from_secs(env_u64("MINT_CRM_REPORTS_INTERVAL_SECS", 86400)),
        }
    }
}

pub struct ReportWorker {
    pool: PgPool,
    config: ReportWorkerConfig,
    shutdown: Arc<Notify>,
}

impl ReportWorker {
    pub fn new(pool: PgPool, config: ReportWorkerConfig) -> Self {
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
            info!("Report worker disabled");
            return;
        }

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Report worker started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Report worker received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(e) = self.generate_automated().await {
                        error!(error = %e, "Failed to generate automated reports");
                    }
                }
            }
        }

        info!("Report worker stopped");
    }

    /// Generate every active automated report. Returns how many completed.
    pub async fn generate_automated(&self) -> crate::Result<usize> {
        let reports = db::reports::list_automated(&self.pool).await?;
        let mut completed = 0;
        for report in &reports {
            match crate::reports::run_report(&self.pool, report).await {
                Ok(execution) if execution.status == ExecutionStatus::Completed => completed += 1,
                Ok(_) => {}
                Err(e) => error!(report_id = report.id, error = %e, "Report execution failed"),
            }
        }
        info!(total = reports.len(), completed, "Automated reports generated");
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ReportWorkerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.poll_interval, Duration::from_secs(86400));
    }
}
