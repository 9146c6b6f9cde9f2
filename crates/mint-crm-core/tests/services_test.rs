// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Assignment, escalation, email intake and template seeding against a real
//! database with mocked mail and SMS delivery.

#[macro_use]
mod common;

use chrono::{Duration, Utc};
use mint_crm_core::db::{self, PageRequest};
use mint_crm_core::models::{
    CaseResponseFilter, CaseSource, CaseStatus, NewCase, Priority, ResponseType, UserRole,
};
use mint_crm_core::permissions::CaseScope;
use mint_crm_core::services::escalation::AUTO_ESCALATION_NOTE;
use mint_crm_core::services::{self, InboundEmail};
use mint_crm_core::Error;

#[tokio::test]
async fn test_assign_case_notifies_assignee() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let t = common::test_notifier(&pool);
    let manager = common::create_user(&pool, UserRole::Manager, "").await;
    let agent = common::create_user(&pool, UserRole::Agent, "251911223344").await;
    let customer = common::create_contact(&pool, "").await;
    let case = common::create_case(&pool, &customer, &manager, Priority::Medium).await;

    let outcome = services::assign_case(
        &pool,
        &t.notifier,
        case.id,
        agent.id,
        &manager,
        Some("Billing expert"),
    )
    .await
    .unwrap();

    assert_eq!(outcome.case.status, CaseStatus::Assigned);
    assert_eq!(outcome.case.assigned_to_id, Some(agent.id));
    assert!(outcome.notifications.email_sent);
    assert!(outcome.notifications.sms_sent);

    let mail = t.mailer.sent();
    assert_eq!(mail.len(), 1);
    assert_eq!(mail[0].to, vec![agent.email.clone()]);
    assert_eq!(mail[0].subject, format!("Case {} assigned to you", case.case_number));

    let sms = t.gateway.sent();
    assert_eq!(sms.len(), 1);
    assert_eq!(sms[0].phone, "0911223344");
    let expected = format!("Case #{} has been assigned to you", case.case_number);
    assert!(sms[0].message.starts_with(&expected));

    let notes = db::case_responses::list_responses(
        &pool,
        &CaseResponseFilter {
            case: Some(case.id),
            response_type: Some(ResponseType::System),
            ..Default::default()
        },
        CaseScope::All,
        PageRequest::default(),
    )
    .await
    .unwrap();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].response.content.starts_with("Case assigned to Test"));
    assert!(notes[0].response.content.ends_with("Billing expert"));
}

#[tokio::test]
async fn test_customer_cannot_be_assignee() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let t = common::test_notifier(&pool);
    let manager = common::create_user(&pool, UserRole::Manager, "").await;
    let portal_user = common::create_user(&pool, UserRole::Customer, "").await;
    let customer = common::create_contact(&pool, "").await;
    let case = common::create_case(&pool, &customer, &manager, Priority::Medium).await;

    let err = services::assign_case(&pool, &t.notifier, case.id, portal_user.id, &manager, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(t.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_auto_assign_prefers_least_loaded_agent() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let t = common::test_notifier(&pool);
    let manager = common::create_user(&pool, UserRole::Manager, "").await;
    let busy = common::create_user(&pool, UserRole::Agent, "").await;
    let idle = common::create_user(&pool, UserRole::Agent, "").await;
    let customer = common::create_contact(&pool, "").await;

    for _ in 0..2 {
        let open = common::create_case(&pool, &customer, &manager, Priority::Low).await;
        db::cases::assign(&pool, open.id, busy.id, CaseStatus::Assigned, None)
            .await
            .unwrap();
    }
    let case = common::create_case(&pool, &customer, &manager, Priority::Low).await;

    let outcome = services::auto_assign(&pool, &t.notifier, case.id, &manager)
        .await
        .unwrap();
    let assignee_id = outcome.case.assigned_to_id.expect("assigned");
    assert_ne!(assignee_id, busy.id);

    // The winner carries no more open work than the idle agent did.
    let (load,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM cases
        WHERE assigned_to_id = $1 AND id <> $2
          AND status IN ('new', 'assigned', 'in_progress')
        "#,
    )
    .bind(assignee_id)
    .bind(case.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(load, 0, "idle agent {} was available", idle.id);

    let assignee = db::users::get_user(&pool, assignee_id).await.unwrap().unwrap();
    assert!(assignee.is_active);
    assert!(matches!(assignee.role, UserRole::Agent | UserRole::Manager));
}

#[tokio::test]
async fn test_manual_escalation_goes_to_a_manager() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let t = common::test_notifier(&pool);
    let agent = common::create_user(&pool, UserRole::Agent, "").await;
    common::create_user(&pool, UserRole::Manager, "").await;
    let customer = common::create_contact(&pool, "").await;
    let case = common::create_case(&pool, &customer, &agent, Priority::Low).await;

    let outcome =
        services::escalate_case(&pool, &t.notifier, case.id, &agent, Some("Angry customer"))
            .await
            .unwrap();
    assert_eq!(outcome.case.status, CaseStatus::Escalated);
    assert_eq!(outcome.case.priority, Priority::High);
    let manager = db::users::get_user(&pool, outcome.case.assigned_to_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(manager.is_manager());
}

#[tokio::test]
async fn test_overdue_sweep_bumps_priority() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let t = common::test_notifier(&pool);
    let agent = common::create_user(&pool, UserRole::Agent, "").await;
    let customer = common::create_contact(&pool, "").await;

    let overdue = db::cases::create_case(
        &pool,
        &NewCase {
            title: "Overdue".into(),
            priority: Priority::Medium,
            customer_id: customer.id,
            assigned_to_id: Some(agent.id),
            due_date: Some(Utc::now() - Duration::hours(2)),
            ..Default::default()
        },
        agent.id,
    )
    .await
    .unwrap();
    let low = db::cases::create_case(
        &pool,
        &NewCase {
            title: "Overdue but low".into(),
            priority: Priority::Low,
            customer_id: customer.id,
            due_date: Some(Utc::now() - Duration::hours(2)),
            ..Default::default()
        },
        agent.id,
    )
    .await
    .unwrap();

    let escalated = services::escalate_overdue_cases(&pool, &t.notifier, Utc::now())
        .await
        .unwrap();
    assert!(escalated >= 1);

    let reloaded = db::cases::get_case(&pool, overdue.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, CaseStatus::Escalated);
    assert_eq!(reloaded.priority, Priority::High);

    let untouched = db::cases::get_case(&pool, low.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, CaseStatus::New);
    assert_eq!(untouched.priority, Priority::Low);

    let notes = db::case_responses::list_responses(
        &pool,
        &CaseResponseFilter {
            case: Some(overdue.id),
            response_type: Some(ResponseType::System),
            ..Default::default()
        },
        CaseScope::All,
        PageRequest::default(),
    )
    .await
    .unwrap();
    assert!(notes.iter().any(|n| n.response.content == AUTO_ESCALATION_NOTE));
    assert!(t.mailer.sent().iter().any(|m| m.to == vec![agent.email.clone()]));

    // A second sweep leaves the already escalated case alone.
    services::escalate_overdue_cases(&pool, &t.notifier, Utc::now())
        .await
        .unwrap();
    let again = db::cases::get_case(&pool, overdue.id).await.unwrap().unwrap();
    assert_eq!(again.priority, Priority::High);
}

async fn overdue_case(
    pool: &sqlx::PgPool,
    customer: &mint_crm_core::models::Contact,
    creator: &mint_crm_core::models::User,
    title: &str,
) -> mint_crm_core::models::Case {
    db::cases::create_case(
        pool,
        &NewCase {
            title: title.into(),
            priority: Priority::Medium,
            customer_id: customer.id,
            due_date: Some(Utc::now() - Duration::hours(2)),
            ..Default::default()
        },
        creator.id,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_overdue_sweep_escalates_unassigned_case() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let t = common::test_notifier(&pool);
    let agent = common::create_user(&pool, UserRole::Agent, "").await;
    let customer = common::create_contact(&pool, "").await;
    let case = overdue_case(&pool, &customer, &agent, "Nobody owns this").await;

    services::escalate_overdue_cases(&pool, &t.notifier, Utc::now())
        .await
        .unwrap();

    let reloaded = db::cases::get_case(&pool, case.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, CaseStatus::Escalated);
    assert_eq!(reloaded.priority, Priority::High);

    let notes = db::case_responses::list_responses(
        &pool,
        &CaseResponseFilter {
            case: Some(case.id),
            response_type: Some(ResponseType::System),
            ..Default::default()
        },
        CaseScope::All,
        PageRequest::default(),
    )
    .await
    .unwrap();
    assert_eq!(notes.len(), 1);
    // Authored by the first manager, or by the creator when there is none.
    let author = db::users::get_user(&pool, notes[0].response.author_id)
        .await
        .unwrap()
        .unwrap();
    assert!(author.id == agent.id || author.is_manager());
}

#[tokio::test]
async fn test_overdue_sweep_drains_every_batch() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let t = common::test_notifier(&pool);
    let agent = common::create_user(&pool, UserRole::Agent, "").await;
    let customer = common::create_contact(&pool, "").await;

    let mut ids = Vec::new();
    for n in 0..3 {
        ids.push(overdue_case(&pool, &customer, &agent, &format!("Late {n}")).await.id);
    }

    let escalated =
        services::escalation::escalate_overdue_in_batches(&pool, &t.notifier, Utc::now(), 1)
            .await
            .unwrap();
    assert!(escalated >= 3);
    for id in ids {
        let case = db::cases::get_case(&pool, id).await.unwrap().unwrap();
        assert_eq!(case.status, CaseStatus::Escalated);
    }
}

#[tokio::test]
async fn test_case_from_inbound_email() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let agent = common::create_user(&pool, UserRole::Agent, "").await;
    let address = common::unique_email("sender");

    let case = services::create_case_from_email(
        &pool,
        &InboundEmail {
            from: format!("Hanna Girma <{address}>"),
            subject: "Cannot log in".into(),
            body: "Password reset link is broken".into(),
            message_id: Some("<abc@mail>".into()),
            thread_id: None,
        },
        agent.id,
    )
    .await
    .unwrap();

    assert_eq!(case.title, "Cannot log in");
    assert_eq!(case.source, CaseSource::Email);
    assert_eq!(case.email_thread_id.as_deref(), Some("<abc@mail>"));

    let contact = db::contacts::get_contact(&pool, case.customer_id).await.unwrap().unwrap();
    assert_eq!(contact.email, address);
    assert_eq!(contact.first_name, "Hanna");
    assert_eq!(contact.last_name, "Girma");

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
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].response.response_type, ResponseType::Customer);
    assert!(!responses[0].response.is_internal);
    assert_eq!(responses[0].response.email_from.as_deref(), Some(address.as_str()));

    // A second mail from the same sender reuses the contact.
    let second = services::create_case_from_email(
        &pool,
        &InboundEmail {
            from: address.clone(),
            subject: String::new(),
            body: "Still broken".into(),
            ..Default::default()
        },
        agent.id,
    )
    .await
    .unwrap();
    assert_eq!(second.customer_id, contact.id);
    assert_eq!(second.title, "Email Support Request");
}

#[tokio::test]
async fn test_template_seeding_is_idempotent() {
    skip_if_no_db!();
    let pool = common::test_pool().await;

    services::templates::seed_default_templates(&pool, None).await.unwrap();
    let second = services::templates::seed_default_templates(&pool, None).await.unwrap();
    assert_eq!(second.email_templates_created, 0);
    assert_eq!(second.sms_templates_created, 0);
}
