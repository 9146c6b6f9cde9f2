// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Contact to company promotion and task lifecycle rules.

#[macro_use]
mod common;

use chrono::{Duration, Utc};
use mint_crm_core::db::{self, PageRequest};
use mint_crm_core::models::{CompanyInput, ContactInput, TaskFilter, TaskInput, TaskStatus};
use uuid::Uuid;

#[tokio::test]
async fn test_customer_contact_promotes_company() {
    skip_if_no_db!();
    let pool = common::test_pool().await;

    let company = db::companies::create_company(
        &pool,
        &CompanyInput {
            name: Some(format!("Addis Freight {}", Uuid::new_v4().simple())),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(!company.is_customer);
    assert!(company.is_prospect);

    let contact = db::contacts::create_contact(
        &pool,
        &ContactInput {
            first_name: Some("Hanna".into()),
            last_name: Some("Tesfaye".into()),
            email: Some(common::unique_email("prospect")),
            company_id: Some(Some(company.id)),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let unchanged = db::companies::get_company(&pool, company.id).await.unwrap().unwrap();
    assert!(!unchanged.is_customer);

    let converted = db::contacts::convert_to_customer(&pool, contact.id)
        .await
        .unwrap()
        .unwrap();
    assert!(converted.is_customer);
    assert!(!converted.is_prospect);

    let promoted = db::companies::get_company(&pool, company.id).await.unwrap().unwrap();
    assert!(promoted.is_customer);
    assert!(!promoted.is_prospect);
}

#[tokio::test]
async fn test_task_completion_stamps_and_clears_completed_at() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let agent = common::create_user(&pool, mint_crm_core::models::UserRole::Agent, "").await;

    let task = db::tasks::create_task(
        &pool,
        &TaskInput {
            title: Some("Call back supplier".into()),
            due_date: Some(Some(Utc::now() + Duration::days(1))),
            ..Default::default()
        },
        agent.id,
    )
    .await
    .unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.completed_at.is_none());

    let done = db::tasks::update_task(
        &pool,
        task.id,
        &TaskInput {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    let stamped = done.completed_at.expect("completed_at stamped");

    // Unrelated edits keep the stamp.
    let renamed = db::tasks::update_task(
        &pool,
        task.id,
        &TaskInput {
            title: Some("Call back supplier (done)".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(renamed.completed_at, Some(stamped));

    let reopened = db::tasks::update_task(
        &pool,
        task.id,
        &TaskInput {
            status: Some(TaskStatus::InProgress),
            due_date: Some(None),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert!(reopened.completed_at.is_none());
    assert!(reopened.due_date.is_none());
}

#[tokio::test]
async fn test_overdue_tasks_skip_closed_and_undated() {
    skip_if_no_db!();
    let pool = common::test_pool().await;
    let agent = common::create_user(&pool, mint_crm_core::models::UserRole::Agent, "").await;
    let tag = Uuid::new_v4().simple().to_string();
    let yesterday = Utc::now() - Duration::days(1);

    let mut ids = Vec::new();
    for (name, status, due) in [
        ("late", TaskStatus::Pending, Some(yesterday)),
        ("done", TaskStatus::Completed, Some(yesterday)),
        ("dropped", TaskStatus::Cancelled, Some(yesterday)),
        ("undated", TaskStatus::Pending, None),
        ("upcoming", TaskStatus::InProgress, Some(Utc::now() + Duration::days(3))),
    ] {
        let task = db::tasks::create_task(
            &pool,
            &TaskInput {
                title: Some(format!("{name} {tag}")),
                status: Some(status),
                due_date: Some(due),
                ..Default::default()
            },
            agent.id,
        )
        .await
        .unwrap();
        ids.push(task.id);
    }

    let filter = TaskFilter {
        search: Some(tag),
        ..Default::default()
    };
    let overdue = db::tasks::list_tasks(&pool, &filter, Some(Utc::now()), PageRequest::default())
        .await
        .unwrap();
    let overdue_ids: Vec<i64> = overdue.iter().map(|t| t.id).collect();
    assert_eq!(overdue_ids, vec![ids[0]]);
    assert!(overdue[0].is_overdue(Utc::now()));
    assert_eq!(
        db::tasks::count_tasks(&pool, &filter, Some(Utc::now())).await.unwrap(),
        1
    );
}
