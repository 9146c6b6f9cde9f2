// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Email, SMS and notification endpoints against recording transports.

#[macro_use]
mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;
use mint_crm_core::models::UserRole;

#[tokio::test]
async fn test_send_email_records_and_delivers() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);

    let (status, email) = app
        .post(
            "/api/emails/send_email/",
            &token,
            json!({
                "to_emails": "client@example.com",
                "subject": "Your invoice",
                "text_content": "Attached.",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{email}");
    assert_eq!(email["status"], "sent");
    assert_eq!(email["user_id"], agent.id);

    let sent = app.mailer.sent();
    assert!(
        sent.iter()
            .any(|m| m.subject == "Your invoice" && m.to == vec!["client@example.com".to_string()])
    );

    // The email belongs to its sender only.
    let other = app.user(UserRole::Agent, "").await;
    let (status, _) = app
        .get(&format!("/api/emails/{}/", email["id"]), &app.token(&other))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(&format!("/api/emails/{}/retry/", email["id"]), &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_email_requires_recipients() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;

    let (status, _) = app
        .post(
            "/api/emails/send_email/",
            &app.token(&agent),
            json!({ "subject": "Nobody" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reply_threads_on_original() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);

    let (_, original) = app
        .post(
            "/api/emails/send_email/",
            &token,
            json!({
                "to_emails": "client@example.com",
                "subject": "Renewal",
                "text_content": "Time to renew.",
            }),
        )
        .await;

    let (status, reply) = app
        .post(
            &format!("/api/emails/{}/reply/", original["id"]),
            &token,
            json!({ "content": "Following up." }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{reply}");
    assert_eq!(reply["subject"], "Re: Renewal");
    assert_eq!(reply["reply_to"], original["message_id"]);
}

async fn sent_email(app: &TestApp, token: &str, subject: &str) -> serde_json::Value {
    let (status, email) = app
        .post(
            "/api/emails/send_email/",
            token,
            json!({
                "to_emails": "client@example.com",
                "subject": subject,
                "text_content": "Order 1142 arrived damaged.",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{email}");
    email
}

#[tokio::test]
async fn test_forward_quotes_original() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);
    let original = sent_email(&app, &token, "Damaged parcel").await;
    let uri = format!("/api/emails/{}/forward/", original["id"]);

    let (status, body) = app.post(&uri, &token, json!({ "message": "FYI" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "to_email is required");

    let (status, forwarded) = app
        .post(&uri, &token, json!({ "to_email": "warehouse@example.com", "message": "FYI" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{forwarded}");
    assert_eq!(forwarded["subject"], "Fwd: Damaged parcel");
    assert_eq!(forwarded["to_emails"], "warehouse@example.com");
    let text = forwarded["text_content"].as_str().unwrap();
    assert!(text.starts_with("FYI\n\n---------- Forwarded message ----------"), "{text}");
    assert!(text.ends_with("Order 1142 arrived damaged."), "{text}");
    assert!(
        app.mailer
            .sent()
            .iter()
            .any(|m| m.to == vec!["warehouse@example.com".to_string()])
    );
}

#[tokio::test]
async fn test_create_case_from_email() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);
    let email = sent_email(&app, &token, "Damaged parcel").await;
    let uri = format!("/api/emails/{}/create_case/", email["id"]);

    let (status, body) = app.post(&uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "customer_id is required");

    let (status, contact) = app
        .post(
            "/api/contacts/",
            &token,
            json!({
                "first_name": "Selam",
                "last_name": "Girma",
                "email": common::unique_email("email-case"),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{contact}");

    let (status, body) = app
        .post(&uri, &token, json!({ "customer_id": contact["id"], "priority": "high" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["case"]["title"], "Damaged parcel");
    assert_eq!(body["case"]["source"], "email");
    assert_eq!(body["case"]["priority"], "high");
    assert_eq!(body["case"]["customer_id"], contact["id"]);
    assert_eq!(body["email"]["case_id"], body["case"]["id"]);
    assert!(body["message"].as_str().unwrap().starts_with("Case CASE-"));
}

#[tokio::test]
async fn test_retry_stops_at_max_retries() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);
    let email = sent_email(&app, &token, "Flaky relay").await;
    let id = email["id"].as_i64().unwrap();
    let uri = format!("/api/emails/{id}/retry/");

    sqlx::query("UPDATE emails SET status = 'failed', retry_count = max_retries - 1 WHERE id = $1")
        .bind(id)
        .execute(app.pool())
        .await
        .unwrap();
    let (status, body) = app.post(&uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "sent");

    sqlx::query("UPDATE emails SET status = 'failed', retry_count = max_retries WHERE id = $1")
        .bind(id)
        .execute(app.pool())
        .await
        .unwrap();
    let (status, body) = app.post(&uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email cannot be retried");
}

#[tokio::test]
async fn test_send_sms_normalises_number() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;

    let (status, sms) = app
        .post(
            "/api/sms/send_sms/",
            &app.token(&agent),
            json!({ "to_number": "251922334455", "message": "Your order shipped" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{sms}");
    assert_eq!(sms["status"], "sent");

    let sent = app.gateway.sent();
    assert!(
        sent.iter()
            .any(|s| s.phone == "0922334455" && s.message == "Your order shipped")
    );
}

#[tokio::test]
async fn test_bulk_sms_counts_missing_phones() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let with_phone = app.user(UserRole::Customer, "0911111111").await;
    let without_phone = app.user(UserRole::Customer, "").await;

    let (status, body) = app
        .post(
            "/api/sms/send_bulk/",
            &app.token(&agent),
            json!({
                "user_ids": [with_phone.id, without_phone.id],
                "message": "Service window tonight",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], 2);
    assert_eq!(body["sent"], 1);
    assert_eq!(body["no_phone"], 1);
}

#[tokio::test]
async fn test_sms_templates_are_manager_only() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let manager = app.user(UserRole::Manager, "").await;

    let (status, _) = app.get("/api/sms-templates/", &app.token(&agent)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/sms-templates/", &app.token(&manager)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_sms_config_verify_reports_missing_credentials() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);

    let (status, config) = app
        .post(
            "/api/sms-configs/",
            &token,
            json!({ "provider": "twilio", "account_sid": "AC123" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{config}");
    assert!(config.get("auth_token").is_none());

    let (status, body) = app
        .post(&format!("/api/sms-configs/{}/verify/", config["id"]), &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("auth_token"));
}

#[tokio::test]
async fn test_assignment_creates_unread_notification() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let manager = app.user(UserRole::Manager, "").await;
    let assignee = app.user(UserRole::Agent, "").await;
    let token = app.token(&manager);
    let assignee_token = app.token(&assignee);

    let (_, contact) = app
        .post(
            "/api/contacts/",
            &token,
            json!({
                "first_name": "Hana",
                "last_name": "Girma",
                "email": common::unique_email("hana"),
            }),
        )
        .await;
    let (_, case) = app
        .post(
            "/api/cases/",
            &token,
            json!({ "title": "Broken export", "customer_id": contact["id"] }),
        )
        .await;
    let (status, _) = app
        .post(
            &format!("/api/cases/{}/assign/", case["id"]),
            &token,
            json!({ "assigned_to": assignee.id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, count) = app
        .get("/api/notifications/unread_count/", &assignee_token)
        .await;
    assert_eq!(count["unread_count"], 1);

    let (status, body) = app
        .post("/api/notifications/mark_all_read/", &assignee_token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 1);

    let (_, count) = app
        .get("/api/notifications/unread_count/", &assignee_token)
        .await;
    assert_eq!(count["unread_count"], 0);
}
