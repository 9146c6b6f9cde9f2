// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Periodic background jobs.
//!
//! Every worker follows the same shape: a `*WorkerConfig` loaded from the
//! environment, a `run` loop that sleeps for the poll interval between cycles,
//! and a [`Notify`](tokio::sync::Notify) handle that stops the loop. A failed
//! cycle is logged and the next one runs on schedule.

pub mod email_cleanup;
pub mod email_queue;
pub mod escalation;
pub mod reminders;
pub mod reports;

pub use email_cleanup::{EmailCleanupWorker, EmailCleanupWorkerConfig};
pub use email_queue::{EmailQueueWorker, EmailQueueWorkerConfig};
pub use escalation::{EscalationWorker, EscalationWorkerConfig};
pub use reminders::{ReminderWorker, ReminderWorkerConfig};
pub use reports::{ReportWorker, ReportWorkerConfig};

/// `"true"` or `"1"` enables, anything else set disables, unset keeps `default`.
pub(crate) fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

pub(crate) fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
