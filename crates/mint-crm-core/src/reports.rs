// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Report generators and export.
//!
//! Each [`ReportType`] maps to a generator that aggregates over the report's
//! look-back window and returns a JSON document. [`run_report`] wraps a
//! generator in a [`ReportExecution`] so failures are recorded rather than
//! lost; [`to_csv`] flattens a stored result for download.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::PgPool;

use crate::db::{self, LabelCount};
use crate::models::{Case, CaseStatus, Report, ReportExecution, ReportFormat, ReportType};
use crate::services::sla;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AgentPerformance {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub assigned: i64,
    pub resolved: i64,
    pub avg_resolution_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ContactCaseCount {
    pub contact_id: i64,
    pub name: String,
    pub email: String,
    pub case_count: i64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / total` as a percentage with two decimals; zero when `total` is zero.
pub fn percentage(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 * 100.0 / total as f64)
    }
}

async fn grouped_case_counts(
    pool: &PgPool,
    column: &str,
    since: DateTime<Utc>,
) -> Result<Vec<LabelCount>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {column} AS label, COUNT(*) AS count
        FROM cases
        WHERE created_at >= $1
        GROUP BY {column}
        ORDER BY count DESC, label
        "#
    );
    sqlx::query_as::<_, LabelCount>(&query)
        .bind(since)
        .fetch_all(pool)
        .await
}

async fn case_summary(pool: &PgPool, since: DateTime<Utc>) -> crate::Result<Value> {
    let (total, avg_hours): (i64, Option<f64>) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               AVG(EXTRACT(EPOCH FROM resolved_at - created_at) / 3600.0)::DOUBLE PRECISION
        FROM cases
        WHERE created_at >= $1
        "#,
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(json!({
        "total_cases": total,
        "by_status": grouped_case_counts(pool, "status", since).await?,
        "by_priority": grouped_case_counts(pool, "priority", since).await?,
        "by_category": grouped_case_counts(pool, "category", since).await?,
        "avg_resolution_hours": avg_hours.map(round2),
    }))
}

async fn email_analytics(pool: &PgPool, since: DateTime<Utc>) -> crate::Result<Value> {
    let stats = db::emails::email_stats(pool, None, since).await?;
    Ok(json!({
        "total_emails": stats.total,
        "sent": stats.sent,
        "delivered": stats.delivered,
        "failed": stats.failed,
        "bounced": stats.bounced,
        "by_status": stats.by_status,
        "by_type": stats.by_type,
        "delivery_rate": percentage(stats.sent + stats.delivered, stats.total),
    }))
}

async fn user_performance(pool: &PgPool, since: DateTime<Utc>) -> crate::Result<Value> {
    let agents = sqlx::query_as::<_, AgentPerformance>(
        r#"
        SELECT u.id AS user_id,
               TRIM(u.first_name || ' ' || u.last_name) AS name,
               u.email,
               COUNT(c.id) AS assigned,
               COUNT(c.id) FILTER (WHERE c.status IN ('resolved', 'closed')) AS resolved,
               AVG(EXTRACT(EPOCH FROM c.resolved_at - c.created_at) / 3600.0)::DOUBLE PRECISION
                   AS avg_resolution_hours
        FROM users u
        LEFT JOIN cases c ON c.assigned_to_id = u.id AND c.created_at >= $1
        WHERE u.is_active AND u.role IN ('agent', 'manager', 'admin')
        GROUP BY u.id
        ORDER BY resolved DESC, assigned DESC, u.id
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|mut a| {
        a.avg_resolution_hours = a.avg_resolution_hours.map(round2);
        a
    })
    .collect::<Vec<_>>();

    Ok(json!({ "agents": agents }))
}

async fn customer_insights(pool: &PgPool, since: DateTime<Utc>) -> crate::Result<Value> {
    let by_company = sqlx::query_as::<_, LabelCount>(
        r#"
        SELECT co.name AS label, COUNT(*) AS count
        FROM cases c
        JOIN companies co ON co.id = c.company_id
        WHERE c.created_at >= $1
        GROUP BY co.name
        ORDER BY count DESC, label
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    let top_contacts = sqlx::query_as::<_, ContactCaseCount>(
        r#"
        SELECT cu.id AS contact_id,
               TRIM(cu.first_name || ' ' || cu.last_name) AS name,
               cu.email,
               COUNT(*) AS case_count
        FROM cases c
        JOIN contacts cu ON cu.id = c.customer_id
        WHERE c.created_at >= $1
        GROUP BY cu.id
        ORDER BY case_count DESC, cu.id
        LIMIT 10
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(json!({
        "by_company": by_company,
        "top_contacts": top_contacts,
    }))
}

async fn sla_compliance(
    pool: &PgPool,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> crate::Result<Value> {
    let cases = db::cases::list_created_since(pool, since).await?;
    Ok(sla_tally(&cases, now))
}

/// Resolved cases split by whether they met their SLA, plus open cases already
/// past their deadline.
fn sla_tally(cases: &[Case], now: DateTime<Utc>) -> Value {
    let (mut resolved, mut within, mut open_breached) = (0_i64, 0_i64, 0_i64);
    for case in cases {
        if case.resolved_at.is_some() {
            resolved += 1;
            if sla::met_sla(case, now) {
                within += 1;
            }
        } else if !matches!(case.status, CaseStatus::Resolved | CaseStatus::Closed)
            && case.sla_breach(now)
        {
            open_breached += 1;
        }
    }

    json!({
        "resolved_cases": resolved,
        "within_sla": within,
        "breached": resolved - within,
        "open_breached": open_breached,
        "compliance_rate": percentage(within, resolved),
    })
}

/// Run the generator for `report` over its window ending at `now`.
pub async fn generate(pool: &PgPool, report: &Report, now: DateTime<Utc>) -> crate::Result<Value> {
    let days = report.window_days();
    let since = now - Duration::days(days);

    let data = match report.report_type {
        ReportType::CaseSummary => case_summary(pool, since).await?,
        ReportType::EmailAnalytics => email_analytics(pool, since).await?,
        ReportType::UserPerformance => user_performance(pool, since).await?,
        ReportType::CustomerInsights => customer_insights(pool, since).await?,
        ReportType::SlaCompliance => sla_compliance(pool, since, now).await?,
        ReportType::Custom => json!({ "parameters": report.parameters }),
    };

    Ok(json!({
        "report_type": report.report_type.as_str(),
        "period_days": days,
        "generated_at": now,
        "data": data,
    }))
}

/// Generate `report` and record the outcome as an execution.
///
/// A generator failure is stored on the execution and does not surface as an
/// error; only failures to write the execution itself do.
pub async fn run_report(pool: &PgPool, report: &Report) -> crate::Result<ReportExecution> {
    let execution = db::reports::start_execution(pool, report.id).await?;

    let execution = match generate(pool, report, Utc::now()).await {
        Ok(data) => {
            let size = serde_json::to_vec(&data)?.len() as i64;
            db::reports::complete_execution(pool, execution.id, &data, size).await?
        }
        Err(e) => {
            tracing::error!(report_id = report.id, error = %e, "Report generation failed");
            db::reports::fail_execution(pool, execution.id, &e.to_string()).await?
        }
    };

    db::reports::touch_last_generated(pool, report.id).await?;
    tracing::info!(
        report_id = report.id,
        execution_id = execution.id,
        status = execution.status.as_str(),
        "Report generated"
    );
    Ok(execution)
}

/// Downloadable rendering of a completed execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub content_type: &'static str,
    pub file_name: String,
    pub body: Vec<u8>,
}

/// Render an execution result in the report's format. PDF and Excel are not
/// produced.
pub fn export(report: &Report, execution: &ReportExecution) -> crate::Result<Export> {
    let stem = format!("report_{}_{}", report.id, execution.id);
    match report.format {
        ReportFormat::Json => Ok(Export {
            content_type: "application/json",
            file_name: format!("{stem}.json"),
            body: serde_json::to_vec_pretty(&execution.result_data)?,
        }),
        ReportFormat::Csv => Ok(Export {
            content_type: "text/csv",
            file_name: format!("{stem}.csv"),
            body: to_csv(&execution.result_data)?.into_bytes(),
        }),
        ReportFormat::Pdf | ReportFormat::Excel => Err(crate::Error::validation(format!(
            "Export format {} is not supported",
            report.format.as_str()
        ))),
    }
}

fn flatten(prefix: &str, value: &Value, rows: &mut Vec<(String, String)>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&join(key), child, rows);
            }
        }
        // Grouped counts read better keyed by their label than by position.
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                match (item.get("label").and_then(Value::as_str), item.get("count")) {
                    (Some(label), Some(count)) => rows.push((join(label), scalar(count))),
                    _ => flatten(&join(&i.to_string()), item, rows),
                }
            }
        }
        other => rows.push((prefix.to_string(), scalar(other))),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten a JSON result into `metric,value` CSV rows.
pub fn to_csv(result: &Value) -> crate::Result<String> {
    let mut rows = Vec::new();
    flatten("", result, &mut rows);

    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_error = |e: csv::Error| crate::Error::Other(format!("CSV export failed: {e}"));
    writer.write_record(["metric", "value"]).map_err(csv_error)?;
    for (metric, value) in &rows {
        writer.write_record([metric, value]).map_err(csv_error)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| crate::Error::Other(format!("CSV export failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| crate::Error::Other(e.to_string()))
}
