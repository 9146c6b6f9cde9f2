// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Support cases and the responses posted on them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use super::Priority;

crm_enum! {
    /// Lifecycle state of a case.
    pub enum CaseStatus {
        #[default]
        New => ("new", "New"),
        Assigned => ("assigned", "Assigned"),
        InProgress => ("in_progress", "In Progress"),
        WaitingCustomer => ("waiting_customer", "Waiting for Customer"),
        WaitingThirdParty => ("waiting_third_party", "Waiting for Third Party"),
        Resolved => ("resolved", "Resolved"),
        Closed => ("closed", "Closed"),
        Escalated => ("escalated", "Escalated"),
    }
}

impl CaseStatus {
    /// States counted as open work when balancing agent load and sweeping overdue cases.
    pub const OPEN: [CaseStatus; 3] = [
        CaseStatus::New,
        CaseStatus::Assigned,
        CaseStatus::InProgress,
    ];

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }
}

crm_enum! {
    pub enum CaseCategory {
        Technical => ("technical", "Technical Support"),
        Billing => ("billing", "Billing"),
        #[default]
        General => ("general", "General Inquiry"),
        FeatureRequest => ("feature_request", "Feature Request"),
        BugReport => ("bug_report", "Bug Report"),
        Account => ("account", "Account Management"),
        Security => ("security", "Security"),
    }
}

crm_enum! {
    /// Channel through which a case arrived.
    pub enum CaseSource {
        Email => ("email", "Email"),
        Phone => ("phone", "Phone"),
        #[default]
        WebForm => ("web_form", "Web Form"),
        Chat => ("chat", "Live Chat"),
        Portal => ("portal", "Customer Portal"),
        SocialMedia => ("social_media", "Social Media"),
    }
}

crm_enum! {
    pub enum ResponseType {
        #[default]
        Internal => ("internal", "Internal Note"),
        Customer => ("customer", "Customer Response"),
        System => ("system", "System Message"),
        Email => ("email", "Email Response"),
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Case {
    pub id: i64,
    pub case_number: String,
    pub title: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub category: CaseCategory,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    #[sqlx(try_from = "String")]
    pub status: CaseStatus,
    #[sqlx(try_from = "String")]
    pub source: CaseSource,
    pub customer_id: i64,
    pub company_id: Option<i64>,
    pub assigned_to_id: Option<i64>,
    pub created_by_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub sla_hours: i32,
    pub first_response_secs: Option<i64>,
    pub resolution_secs: Option<i64>,
    pub tags: Json<Vec<String>>,
    pub email_thread_id: Option<String>,
    pub last_email_sent: Option<DateTime<Utc>>,
}

impl Case {
    pub fn priority_score(&self) -> i32 {
        self.priority.score()
    }

    /// Past its due date. Cases without a due date are never overdue.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date.is_some_and(|due| now > due)
    }

    /// Deadline implied by `sla_hours`.
    pub fn sla_deadline(&self) -> DateTime<Utc> {
        self.created_at + Duration::hours(i64::from(self.sla_hours))
    }

    pub fn sla_breach(&self, now: DateTime<Utc>) -> bool {
        now > self.sla_deadline()
    }
}

/// A case row decorated with the names shown in list views.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CaseListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub case: Case,
    pub customer_name: String,
    pub customer_email: String,
    pub company_name: Option<String>,
    pub assigned_to_name: Option<String>,
    pub response_count: i64,
}

/// Payload for creating a case.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCase {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: CaseCategory,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub source: CaseSource,
    pub customer_id: i64,
    pub company_id: Option<i64>,
    pub assigned_to_id: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
    pub sla_hours: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub email_thread_id: Option<String>,
}

impl NewCase {
    pub fn validate(&self) -> crate::Result<()> {
        if self.title.trim().is_empty() {
            return Err(crate::Error::validation("Title is required"));
        }
        if self.sla_hours.is_some_and(|h| h <= 0) {
            return Err(crate::Error::validation("SLA hours must be positive"));
        }
        Ok(())
    }
}

/// Partial update of a case.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CasePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<CaseCategory>,
    pub priority: Option<Priority>,
    pub status: Option<CaseStatus>,
    pub source: Option<CaseSource>,
    pub customer_id: Option<i64>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub company_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub assigned_to_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub sla_hours: Option<i32>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub priority: Option<Priority>,
    pub category: Option<CaseCategory>,
    pub source: Option<CaseSource>,
    pub assigned_to: Option<i64>,
    pub customer: Option<i64>,
    pub company: Option<i64>,
    pub created_by: Option<i64>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CaseResponse {
    pub id: i64,
    pub case_id: i64,
    pub author_id: i64,
    #[sqlx(try_from = "String")]
    pub response_type: ResponseType,
    pub content: String,
    pub is_internal: bool,
    pub email_message_id: Option<String>,
    pub email_subject: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Option<String>,
    pub email_cc: Option<String>,
    pub email_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A response joined with its author's display name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CaseResponseItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub response: CaseResponse,
    pub author_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCaseResponse {
    pub case_id: i64,
    #[serde(default)]
    pub response_type: ResponseType,
    pub content: String,
    pub is_internal: Option<bool>,
    pub email_subject: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Option<String>,
    pub email_cc: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseResponsePatch {
    pub content: Option<String>,
    pub response_type: Option<ResponseType>,
    pub is_internal: Option<bool>,
    pub email_subject: Option<String>,
    pub email_to: Option<String>,
    pub email_cc: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseResponseFilter {
    pub case: Option<i64>,
    pub response_type: Option<ResponseType>,
    pub is_internal: Option<bool>,
    pub author: Option<i64>,
    pub ordering: Option<String>,
}

#[cfg(test)]
pub(crate) fn test_case(id: i64) -> Case {
    let now = Utc::now();
    Case {
        id,
        case_number: format!("CASE-{id:06}"),
        title: "Printer on fire".into(),
        description: String::new(),
        category: CaseCategory::Technical,
        priority: Priority::Medium,
        status: CaseStatus::New,
        source: CaseSource::Phone,
        customer_id: 1,
        company_id: None,
        assigned_to_id: None,
        created_by_id: 1,
        created_at: now,
        updated_at: now,
        resolved_at: None,
        due_date: None,
        sla_hours: 24,
        first_response_secs: None,
        resolution_secs: None,
        tags: Json(Vec::new()),
        email_thread_id: None,
        last_email_sent: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overdue_requires_due_date() {
        let mut case = test_case(1);
        let now = Utc::now();
        assert!(!case.is_overdue(now));

        case.due_date = Some(now - Duration::minutes(1));
        assert!(case.is_overdue(now));

        case.due_date = Some(now + Duration::hours(1));
        assert!(!case.is_overdue(now));
    }

    #[test]
    fn test_sla_breach_after_sla_hours() {
        let mut case = test_case(1);
        case.created_at = Utc::now() - Duration::hours(30);
        case.sla_hours = 24;
        assert!(case.sla_breach(Utc::now()));

        case.sla_hours = 48;
        assert!(!case.sla_breach(Utc::now()));
    }

    #[test]
    fn test_open_statuses() {
        assert!(CaseStatus::New.is_open());
        assert!(CaseStatus::InProgress.is_open());
        assert!(!CaseStatus::Escalated.is_open());
        assert!(!CaseStatus::Resolved.is_open());
    }

    #[test]
    fn test_new_case_validation() {
        let case = NewCase {
            title: "  ".into(),
            customer_id: 1,
            ..Default::default()
        };
        assert!(case.validate().is_err());

        let case = NewCase {
            title: "Login fails".into(),
            customer_id: 1,
            sla_hours: Some(0),
            ..Default::default()
        };
        assert!(case.validate().is_err());
    }

    #[test]
    fn test_list_item_serializes_flat() {
        let item = CaseListItem {
            case: test_case(3),
            customer_name: "Hana Tesfaye".into(),
            customer_email: "hana@example.com".into(),
            company_name: None,
            assigned_to_name: None,
            response_count: 2,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["case_number"], "CASE-000003");
        assert_eq!(json["response_count"], 2);
        assert_eq!(json["status"], "new");
    }
}
