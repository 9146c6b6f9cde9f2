// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Priority and status changes that leave an audit note on the case.

use serde::Serialize;
use sqlx::PgPool;

use crate::db;
use crate::messaging::{CaseNotifier, NotificationOutcome};
use crate::models::{Case, CaseStatus, Priority, User};

#[derive(Debug, Clone, Serialize)]
pub struct CaseUpdateOutcome {
    pub message: String,
    pub case: Case,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationOutcome>,
}

fn note(kind: &str, from: &str, to: &str, label: &str, extra: Option<&str>) -> String {
    let mut note = format!("{kind} changed from {from} to {to}");
    if let Some(extra) = extra.filter(|e| !e.trim().is_empty()) {
        note.push_str(&format!(". {label}: {extra}"));
    }
    note
}

pub fn priority_note(from: Priority, to: Priority, reason: Option<&str>) -> String {
    note("Priority", from.as_str(), to.as_str(), "Reason", reason)
}

pub fn status_note(from: CaseStatus, to: CaseStatus, extra: Option<&str>) -> String {
    note("Status", from.as_str(), to.as_str(), "Note", extra)
}

pub async fn update_priority(
    pool: &PgPool,
    case_id: i64,
    priority: Priority,
    actor: &User,
    reason: Option<&str>,
) -> crate::Result<CaseUpdateOutcome> {
    let current = db::cases::get_case(pool, case_id)
        .await?
        .ok_or(crate::Error::NotFound("Case"))?;
    let case = db::cases::set_priority(pool, case_id, priority)
        .await?
        .ok_or(crate::Error::NotFound("Case"))?;

    db::case_responses::add_system_note(
        pool,
        case.id,
        actor.id,
        &priority_note(current.priority, priority, reason),
    )
    .await?;

    Ok(CaseUpdateOutcome {
        message: format!("Priority updated to {}", priority.as_str()),
        case,
        notifications: None,
    })
}

/// Change the status. Resolving a case stamps `resolved_at` and tells the
/// customer.
pub async fn update_status(
    pool: &PgPool,
    notifier: &CaseNotifier,
    case_id: i64,
    status: CaseStatus,
    actor: &User,
    extra: Option<&str>,
) -> crate::Result<CaseUpdateOutcome> {
    let current = db::cases::get_case(pool, case_id)
        .await?
        .ok_or(crate::Error::NotFound("Case"))?;
    let case = db::cases::set_status(pool, case_id, status)
        .await?
        .ok_or(crate::Error::NotFound("Case"))?;

    db::case_responses::add_system_note(
        pool,
        case.id,
        actor.id,
        &status_note(current.status, status, extra),
    )
    .await?;

    let newly_resolved =
        status == CaseStatus::Resolved && current.status != CaseStatus::Resolved;
    let notifications = if newly_resolved {
        Some(notifier.case_resolved(&case).await)
    } else {
        None
    };

    Ok(CaseUpdateOutcome {
        message: format!("Status updated to {}", status.as_str()),
        case,
        notifications,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_note() {
        assert_eq!(
            priority_note(Priority::Low, Priority::High, Some("VIP customer")),
            "Priority changed from low to high. Reason: VIP customer"
        );
        assert_eq!(
            priority_note(Priority::Low, Priority::High, Some("  ")),
            "Priority changed from low to high"
        );
    }

    #[test]
    fn test_status_note() {
        assert_eq!(
            status_note(CaseStatus::InProgress, CaseStatus::Resolved, Some("Patched")),
            "Status changed from in_progress to resolved. Note: Patched"
        );
        assert_eq!(
            status_note(CaseStatus::New, CaseStatus::Assigned, None),
            "Status changed from new to assigned"
        );
    }
}
