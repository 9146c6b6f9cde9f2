// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hourly sweep that escalates overdue cases.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use super::{env_flag, env_u64};
use crate::messaging::CaseNotifier;
use crate::services::escalation::escalate_overdue_cases;

#[derive(Debug, Clone)]
pub struct EscalationWorkerConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
}

impl Default for EscalationWorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(3600),
        }
    }
}

impl EscalationWorkerConfig {
    /// Environment variables:
    /// - `MINT_CRM_ESCALATION_ENABLED` (default: true)
    /// - `MINT_CRM_ESCALATION_INTERVAL_SECS` (default: 3600)
    pub fn from_env() -> Self {
        Self {
            enabled: env_flag("MINT_CRM_ESCALATION_ENABLED", true),
            poll_interval: Duration::from_secs(env_u64("MINT_CRM_ESCALATION_INTERVAL_SECS", 3600)),
        }
    }
}

pub struct EscalationWorker {
    pool: PgPool,
    notifier: Arc<CaseNotifier>,
    config: EscalationWorkerConfig,
    shutdown: Arc<Notify>,
}

impl EscalationWorker {
    pub fn new(pool: PgPool, notifier: Arc<CaseNotifier>, config: EscalationWorkerConfig) -> Self {
        Self {
            pool,
            notifier,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    pub async fn run(&self) {
        if !self.config.enabled {
            info!("Escalation worker disabled");
            return;
        }

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Escalation worker started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Escalation worker received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.run_once().await;
                }
            }
        }

        info!("Escalation worker stopped");
    }

    /// One sweep. Returns the number of escalated cases.
    pub async fn run_once(&self) -> usize {
        match escalate_overdue_cases(&self.pool, &self.notifier, Utc::now()).await {
            Ok(0) => {
                debug!("Escalation sweep found no overdue cases");
                0
            }
            Ok(count) => {
                info!(escalated = count, "Escalated {} overdue cases", count);
                count
            }
            Err(e) => {
                error!(error = %e, "Escalation sweep failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = EscalationWorkerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.poll_interval, Duration::from_secs(3600));
    }
}
