// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Case persistence: numbering, SLA metrics and responses.

#[macro_use]
mod common;

use std::collections::HashSet;

use mint_crm_core::db::{self, PageRequest};
use mint_crm_core::models::{
    CaseResponseFilter, CaseStatus, NewCaseResponse, Priority, ResponseType, UserRole,
};
use mint_crm_core::permissions::CaseScope;
use mint_crm_core::services::case_numbers::parse_case_number;

#[tokio::test]
async fn test_case_numbers_increase() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let agent = common::create_user(&pool, UserRole::Agent, "").await;
    let customer = common::create_contact(&pool, "").await;

    let first = common::create_case(&pool, &customer, &agent, Priority::Low).await;
    let second = common::create_case(&pool, &customer, &agent, Priority::Low).await;

    let a = parse_case_number(&first.case_number).unwrap();
    let b = parse_case_number(&second.case_number).unwrap();
    assert!(b > a, "{} should follow {}", second.case_number, first.case_number);
    assert!(second.case_number.starts_with("CASE-"));
}

#[tokio::test]
async fn test_concurrent_case_creation_never_collides() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let agent = common::create_user(&pool, UserRole::Agent, "").await;
    let customer = common::create_contact(&pool, "").await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let pool = pool.clone();
        let agent = agent.clone();
        let customer = customer.clone();
        handles.push(tokio::spawn(async move {
            common::create_case(&pool, &customer, &agent, Priority::Medium)
                .await
                .case_number
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        assert!(numbers.insert(handle.await.unwrap()));
    }
    assert_eq!(numbers.len(), 10);
}

#[tokio::test]
async fn test_first_internal_response_sets_first_response_time() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let agent = common::create_user(&pool, UserRole::Agent, "").await;
    let customer = common::create_contact(&pool, "").await;
    let case = common::create_case(&pool, &customer, &agent, Priority::High).await;
    assert!(case.first_response_secs.is_none());

    // Customer messages do not count as a response.
    db::case_responses::create_response(
        &pool,
        &NewCaseResponse {
            case_id: case.id,
            response_type: ResponseType::Customer,
            content: "Any news?".into(),
            is_internal: Some(false),
            ..Default::default()
        },
        agent.id,
    )
    .await
    .unwrap();
    let reloaded = db::cases::get_case(&pool, case.id).await.unwrap().unwrap();
    assert!(reloaded.first_response_secs.is_none());

    db::case_responses::create_response(
        &pool,
        &NewCaseResponse {
            case_id: case.id,
            response_type: ResponseType::Internal,
            content: "Looking into it".into(),
            ..Default::default()
        },
        agent.id,
    )
    .await
    .unwrap();
    let reloaded = db::cases::get_case(&pool, case.id).await.unwrap().unwrap();
    assert!(reloaded.first_response_secs.is_some());
    assert!(reloaded.updated_at >= case.updated_at);

    let responses = db::case_responses::list_responses(
        &pool,
        &CaseResponseFilter {
            case: Some(case.id),
            ..Default::default()
        },
        CaseScope::All,
        PageRequest::default(),
    )
    .await
    .unwrap();
    assert_eq!(responses.len(), 2);
    assert!(responses[1].response.is_internal);
}

#[tokio::test]
async fn test_resolving_sets_resolution_metrics() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let agent = common::create_user(&pool, UserRole::Agent, "").await;
    let customer = common::create_contact(&pool, "").await;
    let case = common::create_case(&pool, &customer, &agent, Priority::Medium).await;

    let resolved = db::cases::set_status(&pool, case.id, CaseStatus::Resolved)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.status, CaseStatus::Resolved);
    let resolved_at = resolved.resolved_at.expect("resolved_at set");

    let report = mint_crm_core::services::sla::refresh(&pool, case.id, chrono::Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert!(report.resolution_time.is_some());
    assert!(!report.sla_breach);

    // Resolving again keeps the original timestamp.
    let again = db::cases::set_status(&pool, case.id, CaseStatus::Resolved)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.resolved_at, Some(resolved_at));
}

#[tokio::test]
async fn test_customer_scope_only_sees_own_cases() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let agent = common::create_user(&pool, UserRole::Agent, "").await;
    let portal_user = common::create_user(&pool, UserRole::Customer, "").await;

    let mine = common::create_contact(&pool, "").await;
    db::contacts::update_contact(
        &pool,
        mine.id,
        &mint_crm_core::models::ContactInput {
            user_id: Some(Some(portal_user.id)),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let someone_else = common::create_contact(&pool, "").await;

    let own_case = common::create_case(&pool, &mine, &agent, Priority::Low).await;
    let other_case = common::create_case(&pool, &someone_else, &agent, Priority::Low).await;

    let scope = CaseScope::Customer(portal_user.id);
    assert!(
        db::cases::get_visible_case(&pool, own_case.id, scope)
            .await
            .unwrap()
            .is_some()
    );
    assert!(
        db::cases::get_visible_case(&pool, other_case.id, scope)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_escalation_note_failure_rolls_back_status() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let agent = common::create_user(&pool, UserRole::Agent, "").await;
    let customer = common::create_contact(&pool, "").await;
    let case = common::create_case(&pool, &customer, &agent, Priority::Medium).await;

    // No user has id -1, so the note insert violates its foreign key.
    let result = db::cases::mark_escalated(&pool, case.id, Priority::High, -1, "note").await;
    assert!(result.is_err());

    let reloaded = db::cases::get_case(&pool, case.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, CaseStatus::New);
    assert_eq!(reloaded.priority, Priority::Medium);

    let escalated = db::cases::mark_escalated(&pool, case.id, Priority::High, agent.id, "note")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(escalated.status, CaseStatus::Escalated);
}
