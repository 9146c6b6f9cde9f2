// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document upload/download and report generation/export.

#[macro_use]
mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};

use common::TestApp;
use mint_crm_core::models::UserRole;

const BOUNDARY: &str = "mintcrmboundary";

fn multipart_body(fields: &[(&str, Option<&str>, &str)]) -> String {
    let mut body = String::new();
    for (name, file_name, value) in fields {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        match file_name {
            Some(file_name) => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: text/plain\r\n\r\n"
            )),
            None => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
            )),
        }
        body.push_str(value);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

async fn upload(
    app: &TestApp,
    token: &str,
    fields: &[(&str, Option<&str>, &str)],
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/documents/")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields)))
        .unwrap();
    app.send(request).await
}

#[tokio::test]
async fn test_upload_and_download_document() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);

    let (status, document) = upload(
        &app,
        &token,
        &[("file", Some("notes.txt"), "call back on monday")],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{document}");
    assert_eq!(document["title"], "notes.txt");
    assert_eq!(document["file_type"], "txt");
    assert_eq!(document["file_size"], 19);
    assert_eq!(document["uploaded_by_id"], agent.id);

    let request = Request::builder()
        .uri(format!("/api/documents/{}/download/", document["id"]))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = app.send_raw(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"call back on monday");

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/documents/{}/", document["id"]),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;

    let (status, body) = upload(&app, &app.token(&agent), &[("title", None, "Empty")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

async fn create_report(app: &TestApp, token: &str, body: Value) -> Value {
    let (status, report) = app.post("/api/reports/", token, body).await;
    assert_eq!(status, StatusCode::CREATED, "{report}");
    report
}

#[tokio::test]
async fn test_generate_and_export_json_report() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let manager = app.user(UserRole::Manager, "").await;
    let token = app.token(&manager);

    let report = create_report(
        &app,
        &token,
        json!({
            "name": "Echo",
            "report_type": "custom",
            "parameters": { "days": 7, "team": "blue" },
        }),
    )
    .await;

    let (status, _) = app
        .get(&format!("/api/reports/{}/export/", report["id"]), &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, execution) = app
        .post(&format!("/api/reports/{}/generate/", report["id"]), &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{execution}");
    assert_eq!(execution["status"], "completed");
    assert_eq!(execution["result_data"]["period_days"], 7);
    assert_eq!(execution["result_data"]["data"]["parameters"]["team"], "blue");

    let (_, executions) = app
        .get(&format!("/api/reports/{}/executions/", report["id"]), &token)
        .await;
    assert_eq!(executions["count"], 1);

    let (status, exported) = app
        .get(&format!("/api/reports/{}/export/", report["id"]), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exported["report_type"], "custom");
}

#[tokio::test]
async fn test_csv_export_and_unsupported_formats() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let manager = app.user(UserRole::Manager, "").await;
    let token = app.token(&manager);

    let csv_report = create_report(
        &app,
        &token,
        json!({ "name": "Cases CSV", "report_type": "case_summary", "format": "csv" }),
    )
    .await;
    app.post(&format!("/api/reports/{}/generate/", csv_report["id"]), &token, json!({}))
        .await;
    let request = Request::builder()
        .uri(format!("/api/reports/{}/export/", csv_report["id"]))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = app.send_raw(request).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.starts_with("metric,value"), "{text}");

    let pdf_report = create_report(
        &app,
        &token,
        json!({ "name": "Cases PDF", "report_type": "case_summary", "format": "pdf" }),
    )
    .await;
    app.post(&format!("/api/reports/{}/generate/", pdf_report["id"]), &token, json!({}))
        .await;
    let (status, body) = app
        .get(&format!("/api/reports/{}/export/", pdf_report["id"]), &token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Export format pdf is not supported");
}

#[tokio::test]
async fn test_customers_cannot_see_reports() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let customer = app.user(UserRole::Customer, "").await;

    let (status, _) = app.get("/api/reports/", &app.token(&customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_report_window_out_of_range_is_rejected() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let manager = app.user(UserRole::Manager, "").await;

    let (status, body) = app
        .post(
            "/api/reports/",
            &app.token(&manager),
            json!({
                "name": "Forever",
                "report_type": "case_summary",
                "parameters": { "days": 100000000 },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "days must be a whole number between 1 and 3650");
}
