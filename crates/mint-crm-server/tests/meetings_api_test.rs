// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Meeting endpoints: visibility, attendance and templates.

#[macro_use]
mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use common::TestApp;
use mint_crm_core::models::UserRole;

async fn create_meeting(app: &TestApp, token: &str, body: Value) -> Value {
    let (status, meeting) = app.post("/api/meetings/", token, body).await;
    assert_eq!(status, StatusCode::CREATED, "{meeting}");
    meeting
}

#[tokio::test]
async fn test_create_meeting_invites_and_schedules_reminders() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let organizer = app.user(UserRole::Agent, "").await;
    let attendee = app.user(UserRole::Agent, "").await;
    let start = Utc::now() + Duration::days(2);

    let meeting = create_meeting(
        &app,
        &app.token(&organizer),
        json!({
            "title": "Quarterly review",
            "meeting_type": "review",
            "start_time": start,
            "end_time": start + Duration::minutes(45),
            "attendee_ids": [attendee.id],
        }),
    )
    .await;
    assert_eq!(meeting["organizer_id"], organizer.id);
    assert_eq!(meeting["duration_minutes"], 45);
    assert_eq!(meeting["is_upcoming"], true);
    assert_eq!(meeting["attendee_ids"], json!([attendee.id]));

    let (status, reminders) = app
        .get("/api/meeting-reminders/", &app.token(&attendee))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        reminders["results"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r["meeting_id"] == meeting["id"])
    );
}

#[tokio::test]
async fn test_end_before_start_is_rejected() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let organizer = app.user(UserRole::Agent, "").await;
    let start = Utc::now() + Duration::days(1);

    let (status, body) = app
        .post(
            "/api/meetings/",
            &app.token(&organizer),
            json!({
                "title": "Backwards",
                "start_time": start,
                "end_time": start - Duration::minutes(5),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "End time must be after start time");
}

#[tokio::test]
async fn test_private_meeting_hidden_from_outsiders() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let organizer = app.user(UserRole::Agent, "").await;
    let outsider = app.user(UserRole::Agent, "").await;
    let start = Utc::now() + Duration::hours(3);

    let meeting = create_meeting(
        &app,
        &app.token(&organizer),
        json!({
            "title": "Salary talk",
            "start_time": start,
            "end_time": start + Duration::minutes(30),
            "is_private": true,
        }),
    )
    .await;

    let (status, _) = app
        .get(&format!("/api/meetings/{}/", meeting["id"]), &app.token(&outsider))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_join_leave_and_respond() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let organizer = app.user(UserRole::Agent, "").await;
    let attendee = app.user(UserRole::Agent, "").await;
    let outsider = app.user(UserRole::Agent, "").await;
    let start = Utc::now() + Duration::minutes(10);

    let meeting = create_meeting(
        &app,
        &app.token(&organizer),
        json!({
            "title": "Standup",
            "start_time": start,
            "end_time": start + Duration::minutes(15),
            "attendee_ids": [attendee.id],
        }),
    )
    .await;
    let id = meeting["id"].as_i64().unwrap();
    let attendee_token = app.token(&attendee);

    let (status, body) = app
        .post(&format!("/api/meetings/{id}/join/"), &app.token(&outsider), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You are not an attendee of this meeting");

    let (status, attendance) = app
        .post(&format!("/api/meetings/{id}/join/"), &attendee_token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{attendance}");
    assert_eq!(attendance["status"], "attended");
    assert!(attendance["joined_at"].is_string());

    let (status, attendance) = app
        .post(&format!("/api/meetings/{id}/leave/"), &attendee_token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(attendance["left_at"].is_string());

    let (status, _) = app
        .post(&format!("/api/meetings/{id}/leave/"), &app.token(&outsider), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let respond = format!("/api/meeting-attendance/{}/respond/", attendance["id"]);
    let (status, _) = app
        .post(&respond, &attendee_token, json!({ "status": "no_show" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = app
        .post(&respond, &attendee_token, json!({ "status": "accepted" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");
}

#[tokio::test]
async fn test_only_organizer_completes() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let organizer = app.user(UserRole::Agent, "").await;
    let attendee = app.user(UserRole::Agent, "").await;
    let start = Utc::now() - Duration::hours(1);

    let meeting = create_meeting(
        &app,
        &app.token(&organizer),
        json!({
            "title": "Retro",
            "start_time": start,
            "end_time": start + Duration::minutes(30),
            "attendee_ids": [attendee.id],
        }),
    )
    .await;
    let uri = format!("/api/meetings/{}/complete/", meeting["id"]);

    let (status, _) = app.post(&uri, &app.token(&attendee), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(Method::POST, &uri, Some(&app.token(&organizer)), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "completed");
}

#[tokio::test]
async fn test_meeting_from_template_uses_duration() {
    skip_if_no_db!();
    let app = TestApp::new().await;
    let agent = app.user(UserRole::Agent, "").await;
    let token = app.token(&agent);

    let (status, template) = app
        .post(
            "/api/meeting-templates/",
            &token,
            json!({
                "name": "Onboarding call",
                "meeting_type": "client",
                "duration_minutes": 90,
                "default_agenda": "Intro, setup, Q&A",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{template}");

    let start = Utc::now() + Duration::days(3);
    let (status, meeting) = app
        .post(
            &format!("/api/meeting-templates/{}/create_meeting/", template["id"]),
            &token,
            json!({ "start_time": start }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{meeting}");
    assert_eq!(meeting["title"], "Onboarding call");
    assert_eq!(meeting["duration_minutes"], 90);
    assert_eq!(meeting["meeting_type"], "client");
    assert_eq!(meeting["agenda"], "Intro, setup, Q&A");
}
