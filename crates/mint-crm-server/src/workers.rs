// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background workers spawned alongside the HTTP server.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use mint_crm_core::workers::{
    EmailCleanupWorker, EmailCleanupWorkerConfig, EmailQueueWorker, EmailQueueWorkerConfig,
    EscalationWorker, EscalationWorkerConfig, ReminderWorker, ReminderWorkerConfig, ReportWorker,
    ReportWorkerConfig,
};

use crate::state::AppState;

/// Running workers with their shutdown handles.
pub struct BackgroundWorkers {
    tasks: Vec<(&'static str, Arc<Notify>, JoinHandle<()>)>,
}

impl BackgroundWorkers {
    /// Spawn every worker; each reads its own `*_ENABLED` / interval variables.
    pub fn start(state: &AppState) -> Self {
        let mut tasks = Vec::new();

        let escalation = EscalationWorker::new(
            state.pool.clone(),
            state.notifier.clone(),
            EscalationWorkerConfig::from_env(),
        );
        let shutdown = escalation.shutdown_handle();
        tasks.push((
            "escalation",
            shutdown,
            tokio::spawn(async move { escalation.run().await }),
        ));

        let queue = EmailQueueWorker::new(
            state.pool.clone(),
            state.emails().clone(),
            EmailQueueWorkerConfig::from_env(),
        );
        let shutdown = queue.shutdown_handle();
        tasks.push((
            "email queue",
            shutdown,
            tokio::spawn(async move { queue.run().await }),
        ));

        let cleanup =
            EmailCleanupWorker::new(state.pool.clone(), EmailCleanupWorkerConfig::from_env());
        let shutdown = cleanup.shutdown_handle();
        tasks.push((
            "email cleanup",
            shutdown,
            tokio::spawn(async move { cleanup.run().await }),
        ));

        let reminders = ReminderWorker::new(
            state.pool.clone(),
            state.emails().clone(),
            state.sms().clone(),
            ReminderWorkerConfig::from_env(),
        );
        let shutdown = reminders.shutdown_handle();
        tasks.push((
            "meeting reminders",
            shutdown,
            tokio::spawn(async move { reminders.run().await }),
        ));

        let reports = ReportWorker::new(state.pool.clone(), ReportWorkerConfig::from_env());
        let shutdown = reports.shutdown_handle();
        tasks.push((
            "reports",
            shutdown,
            tokio::spawn(async move { reports.run().await }),
        ));

        info!(count = tasks.len(), "Background workers started");
        Self { tasks }
    }

    /// Signal every worker and wait for it to finish its current cycle.
    pub async fn shutdown(self) {
        for (_, shutdown, _) in &self.tasks {
            shutdown.notify_one();
        }
        for (name, _, handle) in self.tasks {
            if let Err(e) = handle.await {
                error!(worker = name, "Worker task panicked: {}", e);
            }
        }
        info!("Background workers stopped");
    }
}
