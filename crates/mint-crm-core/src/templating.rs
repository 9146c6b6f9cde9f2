// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Placeholder substitution for email and SMS templates.
//!
//! Templates reference values with `{{ path.to.value }}`. Paths are resolved
//! against a JSON context; missing values render as an empty string. An
//! unterminated `{{` is copied through literally.

use serde_json::Value;

/// Render `template` against `context`.
pub fn render(template: &str, context: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let path = after_open[..end].trim();
                out.push_str(&lookup(context, path));
                rest = &after_open[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

fn lookup(context: &Value, path: &str) -> String {
    let mut current = context;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return String::new(),
        }
    }

    match current {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Distinct placeholder paths in `template`, in order of first use.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            break;
        };
        let path = after_open[..end].trim();
        if !path.is_empty() && !found.iter().any(|p| p == path) {
            found.push(path.to_string());
        }
        rest = &after_open[end + 2..];
    }
    found
}

/// Context used when previewing or test-sending a template.
pub fn sample_context() -> Value {
    serde_json::json!({
        "case": {
            "case_number": "CASE-000123",
            "title": "Sample Case Title",
            "description": "This is a sample case description for testing purposes.",
            "priority": "high",
            "priority_display": "High",
            "status": "assigned",
            "status_display": "Assigned",
        },
        "assigned_user": {
            "first_name": "John",
            "last_name": "Doe",
            "full_name": "John Doe",
            "email": "john.doe@example.com",
        },
        "customer": {
            "first_name": "Jane",
            "last_name": "Smith",
            "full_name": "Jane Smith",
            "email": "jane.smith@example.com",
        },
        "agent": {
            "full_name": "Support Agent",
        },
        "manager": {
            "first_name": "Maria",
            "full_name": "Maria Manager",
        },
        "response": {
            "content": "Thank you for contacting us. We are looking into your issue.",
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_nested_paths() {
        let ctx = json!({"case": {"case_number": "CASE-000001", "title": "Broken"}});
        assert_eq!(
            render("Re: {{ case.title }} - {{case.case_number}}", &ctx),
            "Re: Broken - CASE-000001"
        );
    }

    #[test]
    fn test_missing_values_render_empty() {
        let ctx = json!({"user": {"first_name": "Sara"}});
        assert_eq!(render("Hi {{ user.last_name }}!", &ctx), "Hi !");
        assert_eq!(render("{{ nope.deeper }}", &ctx), "");
    }

    #[test]
    fn test_scalars_and_arrays() {
        let ctx = json!({"n": 3, "ok": true, "tags": ["a", "b"]});
        assert_eq!(render("{{n}}/{{ok}}/{{tags.1}}", &ctx), "3/true/b");
    }

    #[test]
    fn test_placeholders_are_deduplicated() {
        assert_eq!(
            placeholders("{{ case.title }} {{a}} {{case.title}} {{ open"),
            vec!["case.title".to_string(), "a".to_string()]
        );
    }

    #[test]
    fn test_unterminated_placeholder_is_literal() {
        let ctx = json!({});
        assert_eq!(render("price {{ amount", &ctx), "price {{ amount");
    }

    #[test]
    fn test_sample_context_fills_default_templates() {
        let out = render(
            "Case {{ case.case_number }} assigned to {{ assigned_user.full_name }}",
            &sample_context(),
        );
        assert_eq!(out, "Case CASE-000123 assigned to John Doe");
    }
}
