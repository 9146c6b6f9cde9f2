// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Report definitions and execution history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crm_enum! {
    pub enum ReportType {
        #[default]
        CaseSummary => ("case_summary", "Case Summary"),
        EmailAnalytics => ("email_analytics", "Email Analytics"),
        UserPerformance => ("user_performance", "User Performance"),
        CustomerInsights => ("customer_insights", "Customer Insights"),
        SlaCompliance => ("sla_compliance", "SLA Compliance"),
        Custom => ("custom", "Custom Report"),
    }
}

crm_enum! {
    pub enum ReportFormat {
        #[default]
        Json => ("json", "JSON"),
        Csv => ("csv", "CSV"),
        Pdf => ("pdf", "PDF"),
        Excel => ("excel", "Excel"),
    }
}

crm_enum! {
    pub enum ExecutionStatus {
        #[default]
        Pending => ("pending", "Pending"),
        Running => ("running", "Running"),
        Completed => ("completed", "Completed"),
        Failed => ("failed", "Failed"),
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Report {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub report_type: ReportType,
    #[sqlx(try_from = "String")]
    pub format: ReportFormat,
    pub parameters: serde_json::Value,
    /// Cron expression, informational only.
    pub schedule: String,
    pub created_by_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_generated: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_automated: bool,
}

/// Longest look-back window a report may cover.
pub const MAX_WINDOW_DAYS: i64 = 3650;

impl Report {
    /// Look-back window in days, from `parameters.days` (default 30),
    /// capped at [`MAX_WINDOW_DAYS`].
    pub fn window_days(&self) -> i64 {
        self.parameters
            .get("days")
            .and_then(|v| v.as_i64())
            .filter(|d| *d > 0)
            .map_or(30, |d| d.min(MAX_WINDOW_DAYS))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub report_type: Option<ReportType>,
    pub format: Option<ReportFormat>,
    pub parameters: Option<serde_json::Value>,
    pub schedule: Option<String>,
    pub is_active: Option<bool>,
    pub is_automated: Option<bool>,
}

impl ReportInput {
    /// `parameters` must be an object whose `days`, when present, is a whole
    /// number between 1 and [`MAX_WINDOW_DAYS`].
    pub fn validate_parameters(&self) -> crate::Result<()> {
        let Some(parameters) = &self.parameters else {
            return Ok(());
        };
        if !parameters.is_object() {
            return Err(crate::Error::validation("parameters must be a JSON object"));
        }
        match parameters.get("days") {
            None | Some(serde_json::Value::Null) => Ok(()),
            Some(days) => match days.as_i64() {
                Some(d) if (1..=MAX_WINDOW_DAYS).contains(&d) => Ok(()),
                _ => Err(crate::Error::validation(format!(
                    "days must be a whole number between 1 and {MAX_WINDOW_DAYS}"
                ))),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilter {
    pub report_type: Option<ReportType>,
    pub is_active: Option<bool>,
    pub created_by: Option<i64>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReportExecution {
    pub id: i64,
    pub report_id: i64,
    #[sqlx(try_from = "String")]
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub result_data: serde_json::Value,
    pub error_message: String,
    pub file_size: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_days_defaults_to_thirty() {
        let mut report = Report {
            id: 1,
            name: "Weekly".into(),
            description: String::new(),
            report_type: ReportType::CaseSummary,
            format: ReportFormat::Json,
            parameters: serde_json::json!({}),
            schedule: String::new(),
            created_by_id: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_generated: None,
            is_active: true,
            is_automated: false,
        };
        assert_eq!(report.window_days(), 30);

        report.parameters = serde_json::json!({"days": 7});
        assert_eq!(report.window_days(), 7);

        report.parameters = serde_json::json!({"days": -1});
        assert_eq!(report.window_days(), 30);

        report.parameters = serde_json::json!({"days": 100_000_000});
        assert_eq!(report.window_days(), MAX_WINDOW_DAYS);
    }

    #[test]
    fn test_parameters_validation() {
        let input = |parameters: serde_json::Value| ReportInput {
            parameters: Some(parameters),
            ..Default::default()
        };
        assert!(ReportInput::default().validate_parameters().is_ok());
        assert!(input(serde_json::json!({"days": 90})).validate_parameters().is_ok());
        assert!(input(serde_json::json!({"team": "blue"})).validate_parameters().is_ok());

        let err = input(serde_json::json!({"days": 100_000_000}))
            .validate_parameters()
            .unwrap_err();
        assert_eq!(err.to_string(), "days must be a whole number between 1 and 3650");
        assert!(input(serde_json::json!({"days": 0})).validate_parameters().is_err());
        assert!(input(serde_json::json!({"days": "7"})).validate_parameters().is_err());
        assert!(input(serde_json::json!([1, 2])).validate_parameters().is_err());
    }
}
