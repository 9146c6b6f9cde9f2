// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SLA metrics for a case.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::db;
use crate::models::{Case, CaseStatus};

/// SLA view of a case at a point in time. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlaReport {
    pub case_id: i64,
    pub case_number: String,
    pub first_response_time: Option<i64>,
    pub resolution_time: Option<i64>,
    pub sla_deadline: DateTime<Utc>,
    pub is_overdue: bool,
    pub sla_breach: bool,
    pub priority_score: i32,
}

impl SlaReport {
    pub fn for_case(case: &Case, now: DateTime<Utc>) -> Self {
        Self {
            case_id: case.id,
            case_number: case.case_number.clone(),
            first_response_time: case.first_response_secs,
            resolution_time: case.resolution_secs,
            sla_deadline: case.sla_deadline(),
            is_overdue: case.is_overdue(now),
            sla_breach: case.sla_breach(now),
            priority_score: case.priority_score(),
        }
    }
}

/// Whether a case was closed out inside its SLA window. Unresolved cases
/// count as met until the deadline passes.
pub fn met_sla(case: &Case, now: DateTime<Utc>) -> bool {
    match case.resolved_at {
        Some(resolved) => resolved <= case.sla_deadline(),
        None => {
            !matches!(case.status, CaseStatus::Resolved | CaseStatus::Closed)
                && !case.sla_breach(now)
        }
    }
}

/// Recompute and store the SLA metrics of a case, then report them.
pub async fn refresh(
    pool: &PgPool,
    case_id: i64,
    now: DateTime<Utc>,
) -> crate::Result<Option<SlaReport>> {
    let case = db::cases::refresh_sla_metrics(pool, case_id).await?;
    Ok(case.map(|c| SlaReport::for_case(&c, now)))
}
