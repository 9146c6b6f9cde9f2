// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Case endpoints: creation, visibility, actions and responses.

#[macro_use]
mod common;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use common::TestApp;
use mint_crm_core::models::UserRole;

async fn create_contact(app: &TestApp, token: &str, user_id: Option<i64>) -> Value {
    let (status, body) = app
        .post(
            "/api/contacts/",
            token,
            json!({
                "first_name": "Abebe",
                "last_name": "Kebede",
                "email": common::unique_email("contact"),
                "mobile": "251911223344",
                "user_id": user_id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn create_case(app: &TestApp, token: &str, customer_id: i64) -> Value {
    let (status, body) = app
        .post(
            "/api/cases/",
            token,
            json!({
                "title": "Cannot log in",
                "description": "Password reset mail never arrives",
                "priority": "medium",
                "category": "account",
                "customer_id": customer_id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn test_create_case_assigns_number_and_detail_has_derived_fields() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);

    let contact = create_contact(&app, &token, None).await;
    let case = create_case(&app, &token, contact["id"].as_i64().unwrap()).await;
    assert!(case["case_number"].as_str().unwrap().starts_with("CASE-"));
    assert_eq!(case["status"], "new");

    let (status, detail) = app
        .get(&format!("/api/cases/{}/", case["id"]), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["priority_score"], 2);
    assert_eq!(detail["is_overdue"], false);
    assert_eq!(detail["sla_breach"], false);
    assert!(detail["responses"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_customer_cannot_create_cases_and_sees_only_own() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let customer = app.user(UserRole::Customer, "").await;
    let agent_token = app.token(&agent);
    let customer_token = app.token(&customer);

    let own_contact = create_contact(&app, &agent_token, Some(customer.id)).await;
    let other_contact = create_contact(&app, &agent_token, None).await;
    let own = create_case(&app, &agent_token, own_contact["id"].as_i64().unwrap()).await;
    let other = create_case(&app, &agent_token, other_contact["id"].as_i64().unwrap()).await;

    let (status, _) = app
        .post(
            "/api/cases/",
            &customer_token,
            json!({ "title": "Mine", "customer_id": own_contact["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .get(&format!("/api/cases/{}/", own["id"]), &customer_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .get(&format!("/api/cases/{}/", other["id"]), &customer_token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, mine) = app.get("/api/cases/my_cases/", &customer_token).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = mine["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![own["id"].as_i64().unwrap()]);
}

#[tokio::test]
async fn test_assign_notifies_by_email_and_sms() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let manager = app.user(UserRole::Manager, "").await;
    let assignee = app.user(UserRole::Agent, "251911000111").await;
    let token = app.token(&manager);

    let contact = create_contact(&app, &token, None).await;
    let case = create_case(&app, &token, contact["id"].as_i64().unwrap()).await;

    let (status, body) = app
        .post(
            &format!("/api/cases/{}/assign/", case["id"]),
            &token,
            json!({ "assigned_to": assignee.id, "reason": "Billing expert" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["case"]["status"], "assigned");
    assert_eq!(body["case"]["assigned_to_id"], assignee.id);
    assert_eq!(body["notifications"]["email_sent"], true);
    assert_eq!(body["notifications"]["sms_sent"], true);

    let sms = app.gateway.sent();
    assert!(sms.iter().any(|s| s.phone == "0911000111"));
    assert!(app.mailer.sent().iter().any(|m| m.to.contains(&assignee.email)));

    // Customers cannot be assignees.
    let customer = app.user(UserRole::Customer, "").await;
    let (status, _) = app
        .post(
            &format!("/api/cases/{}/assign/", case["id"]),
            &token,
            json!({ "assigned_to": customer.id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_status_resolved_sets_resolved_at() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let manager = app.user(UserRole::Manager, "").await;
    let token = app.token(&manager);

    let contact = create_contact(&app, &token, None).await;
    let case = create_case(&app, &token, contact["id"].as_i64().unwrap()).await;

    let (status, body) = app
        .post(
            &format!("/api/cases/{}/update_status/", case["id"]),
            &token,
            json!({ "status": "resolved", "note": "Reset link resent" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, detail) = app
        .get(&format!("/api/cases/{}/", case["id"]), &token)
        .await;
    assert_eq!(detail["status"], "resolved");
    assert!(detail["resolved_at"].is_string());
    let notes: Vec<&str> = detail["responses"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["content"].as_str())
        .collect();
    assert!(
        notes
            .iter()
            .any(|n| n.starts_with("Status changed from new to resolved")),
        "{notes:?}"
    );
}

#[tokio::test]
async fn test_patch_null_clears_assignee_and_due_date() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let manager = app.user(UserRole::Manager, "").await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&manager);

    let contact = create_contact(&app, &token, None).await;
    let case = create_case(&app, &token, contact["id"].as_i64().unwrap()).await;
    let uri = format!("/api/cases/{}/", case["id"]);

    let (status, body) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "assigned_to_id": agent.id, "due_date": "2030-01-01T00:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["assigned_to_id"], agent.id);
    assert!(body["due_date"].is_string());

    // Absent keys leave the values alone.
    let (status, body) = app
        .request(Method::PATCH, &uri, Some(&token), Some(json!({ "title": "Still locked out" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["assigned_to_id"], agent.id);
    assert!(body["due_date"].is_string());

    let (status, body) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "assigned_to_id": null, "due_date": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["assigned_to_id"].is_null());
    assert!(body["due_date"].is_null());
    assert_eq!(body["title"], "Still locked out");
}

#[tokio::test]
async fn test_patch_rejects_customer_assignee() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let manager = app.user(UserRole::Manager, "").await;
    let customer = app.user(UserRole::Customer, "").await;
    let token = app.token(&manager);

    let contact = create_contact(&app, &token, None).await;
    let case = create_case(&app, &token, contact["id"].as_i64().unwrap()).await;

    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/api/cases/{}/", case["id"]),
            Some(&token),
            Some(json!({ "assigned_to_id": customer.id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "Assignee must be an active agent, manager or admin");

    let (_, detail) = app.get(&format!("/api/cases/{}/", case["id"]), &token).await;
    assert!(detail["assigned_to_id"].is_null());
}

#[tokio::test]
async fn test_escalate_with_empty_body() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let _manager = app.user(UserRole::Manager, "").await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);

    let contact = create_contact(&app, &token, None).await;
    let case = create_case(&app, &token, contact["id"].as_i64().unwrap()).await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/cases/{}/escalate/", case["id"]),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["case"]["status"], "escalated");
    assert_eq!(body["case"]["priority"], "high");
}

#[tokio::test]
async fn test_response_email_is_sent_once() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);

    let contact = create_contact(&app, &token, None).await;
    let case = create_case(&app, &token, contact["id"].as_i64().unwrap()).await;

    let (status, response) = app
        .post(
            "/api/case-responses/",
            &token,
            json!({
                "case_id": case["id"],
                "response_type": "internal",
                "content": "Checked the mail logs",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{response}");
    assert_eq!(response["author_id"], agent.id);

    let uri = format!("/api/case-responses/{}/send_email/", response["id"]);
    let (status, body) = app.post(&uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Email sent successfully");

    let (status, body) = app.post(&uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email already sent");
}

#[tokio::test]
async fn test_staff_responses_default_to_internal() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let customer = app.user(UserRole::Customer, "").await;
    let token = app.token(&agent);
    let customer_token = app.token(&customer);

    let contact = create_contact(&app, &token, Some(customer.id)).await;
    let case = create_case(&app, &token, contact["id"].as_i64().unwrap()).await;
    let sms_before = app.gateway.sent().len();

    let (status, hidden) = app
        .post(
            "/api/case-responses/",
            &token,
            json!({
                "case_id": case["id"],
                "response_type": "customer",
                "content": "Draft reply",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{hidden}");
    assert_eq!(hidden["is_internal"], true);

    let (status, shared) = app
        .post(
            "/api/case-responses/",
            &token,
            json!({
                "case_id": case["id"],
                "response_type": "customer",
                "content": "We reset your password",
                "is_internal": false,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{shared}");

    let (status, body) = app
        .get(&format!("/api/case-responses/?case={}", case["id"]), &customer_token)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let ids: Vec<i64> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![shared["id"].as_i64().unwrap()]);

    // Only the shared reply texted the customer.
    assert_eq!(app.gateway.sent().len(), sms_before + 1);
}

#[tokio::test]
async fn test_dashboard_stats_shape() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let manager = app.user(UserRole::Manager, "").await;
    let token = app.token(&manager);

    let (status, body) = app.get("/api/cases/dashboard_stats/?days=7", &token).await;
    assert_eq!(status, StatusCode::OK);
    for key in [
        "total_cases",
        "new_cases",
        "in_progress_cases",
        "resolved_cases",
        "overdue_cases",
        "by_priority",
        "by_status",
        "by_category",
    ] {
        assert!(body.get(key).is_some(), "missing {key}");
    }
}
