// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL data access.
//!
//! Each submodule holds free functions over a `&PgPool` for one table family.
//! List queries follow one shape: optional filters are bound as nullable
//! parameters (`$n::TEXT IS NULL OR col = $n`), free-text search is a single
//! `ILIKE` pattern, and `ORDER BY` is assembled from a per-table whitelist so
//! client input never reaches the SQL text.

pub mod case_responses;
pub mod cases;
pub mod companies;
pub mod contacts;
pub mod documents;
pub mod email_configs;
pub mod email_templates;
pub mod emails;
pub mod meetings;
pub mod notifications;
pub mod reports;
pub mod sms;
pub mod sms_configs;
pub mod sms_templates;
pub mod tasks;
pub mod users;

/// SQL ranking a priority column the way `Priority::score` does.
macro_rules! priority_rank {
    ($col:literal) => {
        concat!(
            "CASE ",
            $col,
            " WHEN 'urgent' THEN 4 WHEN 'high' THEN 3 WHEN 'medium' THEN 2 ELSE 1 END"
        )
    };
}
pub(crate) use priority_rank;

/// LIMIT/OFFSET window for a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: i64 = 20;
    pub const MAX_PAGE_SIZE: i64 = 100;

    /// One-based page number and page size, clamped to sane bounds.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let size = page_size
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE);
        let page = page.unwrap_or(1).max(1);
        Self {
            limit: size,
            offset: (page - 1) * size,
        }
    }

    /// First `limit` rows.
    pub fn first(limit: i64) -> Self {
        Self { limit, offset: 0 }
    }

    pub fn page_number(&self) -> i64 {
        self.offset / self.limit.max(1) + 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Build an ORDER BY list from a DRF-style `ordering` parameter.
///
/// `ordering` is a comma separated list of field names, each optionally
/// prefixed with `-` for descending order. Names not present in `allowed`
/// (pairs of public name and SQL expression) are ignored; when nothing
/// usable remains, `default` is returned unchanged.
pub fn order_by(ordering: Option<&str>, allowed: &[(&str, &str)], default: &str) -> String {
    let clauses: Vec<String> = ordering
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            let (name, direction) = match token.strip_prefix('-') {
                Some(name) => (name, "DESC"),
                None => (token, "ASC"),
            };
            allowed
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, expr)| format!("{expr} {direction}"))
        })
        .collect();

    if clauses.is_empty() {
        default.to_string()
    } else {
        clauses.join(", ")
    }
}

/// `%term%` pattern for ILIKE, or `None` for a blank search.
pub fn search_pattern(search: Option<&str>) -> Option<String> {
    let term = search.map(str::trim).filter(|s| !s.is_empty())?;
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}

/// Count per label, as returned by the `GROUP BY` statistics queries.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, sqlx::FromRow)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

/// Connectivity check used by the server's `/health` route.
pub async fn health_check(pool: &sqlx::PgPool) -> bool {
    let result: Result<(i32,), _> = sqlx::query_as("SELECT 1").fetch_one(pool).await;
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: &[(&str, &str)] = &[
        ("created_at", "c.created_at"),
        ("priority", priority_rank!("c.priority")),
    ];

    #[test]
    fn test_order_by_parses_direction() {
        assert_eq!(
            order_by(Some("-created_at"), ALLOWED, "c.id DESC"),
            "c.created_at DESC"
        );
        assert_eq!(
            order_by(Some("created_at"), ALLOWED, "c.id DESC"),
            "c.created_at ASC"
        );
    }

    #[test]
    fn test_order_by_ignores_unknown_fields() {
        assert_eq!(
            order_by(Some("password; DROP TABLE cases"), ALLOWED, "c.id DESC"),
            "c.id DESC"
        );
        assert_eq!(order_by(None, ALLOWED, "c.id DESC"), "c.id DESC");
    }

    #[test]
    fn test_order_by_multiple_fields() {
        let sql = order_by(Some("-priority, created_at"), ALLOWED, "x");
        assert!(sql.starts_with("CASE c.priority WHEN 'urgent' THEN 4"));
        assert!(sql.ends_with("END DESC, c.created_at ASC"));
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        assert_eq!(search_pattern(Some("  ")), None);
        assert_eq!(search_pattern(None), None);
        assert_eq!(search_pattern(Some("acme")).as_deref(), Some("%acme%"));
        assert_eq!(search_pattern(Some("50%_off")).as_deref(), Some("%50\\%\\_off%"));
    }

    #[test]
    fn test_page_request_clamps() {
        let page = PageRequest::new(Some(3), Some(10));
        assert_eq!(page, PageRequest { limit: 10, offset: 20 });
        assert_eq!(page.page_number(), 3);

        let page = PageRequest::new(Some(0), Some(1000));
        assert_eq!(page, PageRequest { limit: 100, offset: 0 });

        assert_eq!(PageRequest::default().limit, 20);
    }
}
