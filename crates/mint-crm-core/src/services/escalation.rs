// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Manual escalation and the overdue-case sweep.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::assignment::AssignmentOutcome;
use crate::db;
use crate::messaging::CaseNotifier;
use crate::models::{Case, CaseStatus, Priority, User};

/// Note written on every case the sweep escalates.
pub const AUTO_ESCALATION_NOTE: &str = "Case automatically escalated due to overdue status";

/// Cases fetched per query while sweeping.
const SWEEP_BATCH: i64 = 500;

/// Priority after an overdue escalation: medium becomes high, high becomes
/// urgent. Other priorities are not swept.
pub fn bumped_priority(priority: Priority) -> Option<Priority> {
    match priority {
        Priority::Medium => Some(Priority::High),
        Priority::High => Some(Priority::Urgent),
        Priority::Low | Priority::Urgent => None,
    }
}

/// Priority after a manual escalation: at least high.
pub fn manual_escalation_priority(priority: Priority) -> Priority {
    if priority == Priority::Urgent {
        Priority::Urgent
    } else {
        Priority::High
    }
}

/// Hand a case to the first available manager.
pub async fn escalate_case(
    pool: &PgPool,
    notifier: &CaseNotifier,
    case_id: i64,
    actor: &User,
    reason: Option<&str>,
) -> crate::Result<AssignmentOutcome> {
    let manager = db::users::first_manager(pool)
        .await?
        .ok_or_else(|| crate::Error::validation("No managers available for escalation"))?;

    let current = db::cases::get_case(pool, case_id)
        .await?
        .ok_or(crate::Error::NotFound("Case"))?;

    let case = db::cases::assign(
        pool,
        case_id,
        manager.id,
        CaseStatus::Escalated,
        Some(manual_escalation_priority(current.priority)),
    )
    .await?
    .ok_or(crate::Error::NotFound("Case"))?;

    let mut note = format!("Case escalated to {}", manager.full_name());
    if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
        note.push_str(&format!(". Reason: {reason}"));
    }
    db::case_responses::add_system_note(pool, case.id, actor.id, &note).await?;

    tracing::info!(case_id = case.id, manager_id = manager.id, "Case escalated");

    let notifications = notifier.case_escalated(&case, &manager).await;
    Ok(AssignmentOutcome {
        message: format!("Case escalated to {}", manager.full_name()),
        case,
        notifications,
    })
}

/// Author of the sweep's note: the assignee, else `manager`, else the
/// case's creator.
pub fn sweep_note_author(case: &Case, manager: Option<&User>) -> i64 {
    case.assigned_to_id
        .or(manager.map(|m| m.id))
        .unwrap_or(case.created_by_id)
}

/// Escalate every open medium/high case whose due date has passed.
///
/// Each case gets a bumped priority, the `escalated` status and a system
/// note; its assignee is emailed. The note is authored by the assignee, else
/// the first manager, else whoever created the case. A case that fails to
/// update is logged and left for the next sweep. Candidates are fetched in
/// batches until none remain. Returns how many cases were escalated.
pub async fn escalate_overdue_cases(
    pool: &PgPool,
    notifier: &CaseNotifier,
    now: DateTime<Utc>,
) -> crate::Result<usize> {
    escalate_overdue_in_batches(pool, notifier, now, SWEEP_BATCH).await
}

/// [`escalate_overdue_cases`] with an explicit batch size.
pub async fn escalate_overdue_in_batches(
    pool: &PgPool,
    notifier: &CaseNotifier,
    now: DateTime<Utc>,
    batch: i64,
) -> crate::Result<usize> {
    let fallback_author = db::users::first_manager(pool).await?;
    let mut escalated = 0;
    // Cases that failed this sweep; re-fetched rows are skipped, not retried.
    let mut failed: HashSet<i64> = HashSet::new();

    loop {
        let limit = batch.max(1) + failed.len() as i64;
        let candidates: Vec<_> = db::cases::list_escalation_candidates(pool, now, limit)
            .await?
            .into_iter()
            .filter(|c| !failed.contains(&c.id))
            .collect();
        if candidates.is_empty() {
            break;
        }

        for candidate in candidates {
            let Some(priority) = bumped_priority(candidate.priority) else {
                failed.insert(candidate.id);
                continue;
            };
            let author_id = sweep_note_author(&candidate, fallback_author.as_ref());

            let case = match db::cases::mark_escalated(
                pool,
                candidate.id,
                priority,
                author_id,
                AUTO_ESCALATION_NOTE,
            )
            .await
            {
                Ok(Some(case)) => case,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(
                        case_id = candidate.id,
                        error = %e,
                        "Failed to escalate overdue case"
                    );
                    failed.insert(candidate.id);
                    continue;
                }
            };
            escalated += 1;

            tracing::info!(
                case_id = case.id,
                case_number = %case.case_number,
                priority = priority.as_str(),
                "Overdue case escalated"
            );

            if let Some(assignee_id) = case.assigned_to_id {
                match db::users::get_user(pool, assignee_id).await {
                    Ok(Some(assignee)) => {
                        notifier.case_escalated(&case, &assignee).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(case_id = case.id, error = %e, "Failed to load assignee");
                    }
                }
            }
        }
    }

    Ok(escalated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bumped_priority() {
        assert_eq!(bumped_priority(Priority::Medium), Some(Priority::High));
        assert_eq!(bumped_priority(Priority::High), Some(Priority::Urgent));
        assert_eq!(bumped_priority(Priority::Low), None);
        assert_eq!(bumped_priority(Priority::Urgent), None);
    }

    #[test]
    fn test_sweep_note_author_falls_back_to_creator() {
        use crate::models::{UserRole, test_case, test_user};

        let mut case = test_case(1);
        case.created_by_id = 7;
        let manager = test_user(2, UserRole::Manager);

        assert_eq!(sweep_note_author(&case, None), 7);
        assert_eq!(sweep_note_author(&case, Some(&manager)), 2);

        case.assigned_to_id = Some(5);
        assert_eq!(sweep_note_author(&case, Some(&manager)), 5);
    }

    #[test]
    fn test_manual_escalation_keeps_urgent() {
        assert_eq!(manual_escalation_priority(Priority::Low), Priority::High);
        assert_eq!(manual_escalation_priority(Priority::Urgent), Priority::Urgent);
    }
}
