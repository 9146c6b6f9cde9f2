// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Manual and automatic case assignment.

use serde::Serialize;
use sqlx::PgPool;

use crate::db;
use crate::messaging::{CaseNotifier, NotificationOutcome};
use crate::models::{Case, CaseStatus, User};

/// Result of assigning a case.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentOutcome {
    pub message: String,
    pub case: Case,
    pub notifications: NotificationOutcome,
}

/// System note recorded on assignment.
pub fn assignment_note(assignee: &User, reason: Option<&str>) -> String {
    format!(
        "Case assigned to {}. {}",
        assignee.full_name(),
        reason.unwrap_or_default()
    )
    .trim()
    .to_string()
}

/// Load `user_id` if it may own cases.
pub async fn assignable_user(pool: &PgPool, user_id: i64) -> crate::Result<User> {
    db::users::get_user(pool, user_id)
        .await?
        .filter(|u| u.is_active && u.is_agent())
        .ok_or_else(|| {
            crate::Error::validation("Assignee must be an active agent, manager or admin")
        })
}

/// Assign `case_id` to `assignee_id` on behalf of `actor`.
///
/// The assignee must be an active staff member. The case moves to
/// `assigned`, a system note is written and the assignee is notified.
pub async fn assign_case(
    pool: &PgPool,
    notifier: &CaseNotifier,
    case_id: i64,
    assignee_id: i64,
    actor: &User,
    reason: Option<&str>,
) -> crate::Result<AssignmentOutcome> {
    let assignee = assignable_user(pool, assignee_id).await?;
    assign_to(pool, notifier, case_id, &assignee, actor, reason).await
}

async fn assign_to(
    pool: &PgPool,
    notifier: &CaseNotifier,
    case_id: i64,
    assignee: &User,
    actor: &User,
    reason: Option<&str>,
) -> crate::Result<AssignmentOutcome> {
    let case = db::cases::assign(pool, case_id, assignee.id, CaseStatus::Assigned, None)
        .await?
        .ok_or(crate::Error::NotFound("Case"))?;

    db::case_responses::add_system_note(pool, case.id, actor.id, &assignment_note(assignee, reason))
        .await?;

    tracing::info!(
        case_id = case.id,
        assignee_id = assignee.id,
        actor_id = actor.id,
        "Case assigned"
    );

    let notifications = notifier.case_assigned(&case, assignee).await;

    Ok(AssignmentOutcome {
        message: format!("Case assigned to {}", assignee.full_name()),
        case,
        notifications,
    })
}

/// Assign to the least-loaded active agent or manager.
pub async fn auto_assign(
    pool: &PgPool,
    notifier: &CaseNotifier,
    case_id: i64,
    actor: &User,
) -> crate::Result<AssignmentOutcome> {
    let agent = db::users::least_loaded_agent(pool)
        .await?
        .ok_or_else(|| crate::Error::validation("No agents available"))?;

    assign_to(pool, notifier, case_id, &agent, actor, Some("Auto-assigned based on workload."))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use chrono::Utc;

    fn agent() -> User {
        User {
            id: 4,
            email: "sam@example.com".into(),
            password_hash: String::new(),
            first_name: "Sam".into(),
            last_name: "Tesfaye".into(),
            role: UserRole::Agent,
            company: String::new(),
            phone: String::new(),
            department: String::new(),
            is_active: true,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_assignment_note() {
        assert_eq!(
            assignment_note(&agent(), Some("Billing expert")),
            "Case assigned to Sam Tesfaye. Billing expert"
        );
        assert_eq!(assignment_note(&agent(), None), "Case assigned to Sam Tesfaye.");
    }
}
