// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Contact conversion and task endpoints.

#[macro_use]
mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;
use mint_crm_core::models::UserRole;

#[tokio::test]
async fn test_convert_to_customer_promotes_company_once() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);

    let (status, company) = app
        .post(
            "/api/companies/",
            &token,
            json!({ "name": format!("Blue Nile Imports {}", common::unique_email("co")) }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{company}");
    assert_eq!(company["is_customer"], false);

    let (status, contact) = app
        .post(
            "/api/contacts/",
            &token,
            json!({
                "first_name": "Dawit",
                "last_name": "Alemu",
                "email": common::unique_email("convert"),
                "company_id": company["id"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{contact}");

    let uri = format!("/api/contacts/{}/convert_to_customer/", contact["id"]);
    let (status, converted) = app.post(&uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{converted}");
    assert_eq!(converted["is_customer"], true);
    assert_eq!(converted["is_prospect"], false);

    let (_, company) = app
        .get(&format!("/api/companies/{}/", company["id"]), &token)
        .await;
    assert_eq!(company["is_customer"], true);
    assert_eq!(company["is_prospect"], false);

    let (status, body) = app.post(&uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Contact is already a customer");
}

#[tokio::test]
async fn test_task_status_drives_completed_at() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);

    let (status, task) = app
        .post(
            "/api/tasks/",
            &token,
            json!({
                "title": "Send revised quote",
                "assigned_to_id": agent.id,
                "due_date": "2020-01-01T00:00:00Z",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{task}");
    assert_eq!(task["is_overdue"], true);
    assert!(task["completed_at"].is_null());

    let uri = format!("/api/tasks/{}/", task["id"]);
    let (status, done) = app
        .request(Method::PATCH, &uri, Some(&token), Some(json!({ "status": "completed" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{done}");
    assert!(done["completed_at"].is_string());
    assert_eq!(done["is_overdue"], false);

    let (status, reopened) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&token),
            Some(json!({ "status": "pending", "assigned_to_id": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{reopened}");
    assert!(reopened["completed_at"].is_null());
    assert!(reopened["assigned_to_id"].is_null());
    assert_eq!(reopened["is_overdue"], true);
}
